//! HTTP surface: HTML page, JSON API, Prometheus metrics and the PiOLED
//! preview image, all read from the shared store.

pub mod config;
pub mod handlers;
pub mod router;

pub use config::WebConfig;
pub use router::create_app;

use crate::config::DEFAULT_STALE_AFTER;
use crate::error::{PitempError, Result};
use crate::metrics::PrometheusMetrics;
use crate::net;
use crate::reading::{ApiReading, ReadingStore};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Shared state of all handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<ReadingStore>,
    pub metrics: Option<Arc<PrometheusMetrics>>,
    /// Interface reported in the `IP` field; empty disables the lookup
    pub ip_iface: String,
    /// Staleness threshold of the `/pioled` preview
    pub stale_after: Duration,
}

impl AppState {
    pub fn new(store: Arc<ReadingStore>) -> Self {
        Self {
            store,
            metrics: None,
            ip_iface: String::new(),
            stale_after: DEFAULT_STALE_AFTER,
        }
    }

    pub fn with_metrics(mut self, metrics: Option<Arc<PrometheusMetrics>>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn with_ip_iface(mut self, iface: impl Into<String>) -> Self {
        self.ip_iface = iface.into();
        self
    }

    pub fn with_stale_after(mut self, stale_after: Duration) -> Self {
        self.stale_after = stale_after;
        self
    }

    /// Wire form of the current reading with a fresh interface lookup.
    pub fn api_reading(&self) -> ApiReading {
        let ip = net::display_ip(&self.ip_iface).unwrap_or_default();
        ApiReading::from_reading(&self.store.get(), ip)
    }
}

/// Bind the listener described by `config`.
pub async fn bind(config: &WebConfig) -> Result<TcpListener> {
    let addr = config
        .bind_address()
        .parse::<SocketAddr>()
        .map_err(|e| PitempError::config_error(format!("Invalid bind address: {}", e)))?;

    TcpListener::bind(&addr)
        .await
        .map_err(|e| PitempError::web_server_error(format!("Failed to bind to {}: {}", addr, e)))
}

/// Serve `state` on `listener` until `token` is cancelled, then finish
/// in-flight requests and return.
pub async fn serve(
    listener: TcpListener,
    config: &WebConfig,
    state: AppState,
    token: CancellationToken,
) -> Result<()> {
    let has_metrics = state.metrics.is_some();
    let app = create_app(state, config);

    if let Ok(addr) = listener.local_addr() {
        info!("Serving on http://{}", addr);
        info!("API endpoint: http://{}/api", addr);
        if has_metrics {
            info!("Metrics endpoint: http://{}/metrics", addr);
        }
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { token.cancelled().await })
        .await
        .map_err(|e| PitempError::web_server_error(format!("Server error: {}", e)))
}
