//! Application assembly.
//!
//! [`App::start`] turns an [`AppConfig`] into running activities: one writer
//! of the store (sensor poller or remote fetcher), one updater per display
//! and optionally the HTTP server, all under one [`Coordinator`].

use crate::config::{AppConfig, InitPolicy, Mode};
use crate::display::{self, DisplayUpdater};
use crate::error::{PitempError, Result};
use crate::lifecycle::{Cleanup, Coordinator, ShutdownSummary};
use crate::metrics::{MetricsSink, PrometheusMetrics};
use crate::reading::ReadingStore;
use crate::sensor;
use crate::tasks::{RemoteFetcher, SensorPoller};
use crate::web::{self, AppState};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// A started pitemp process.
pub struct App {
    coordinator: Coordinator,
    store: Arc<ReadingStore>,
    local_addr: Option<SocketAddr>,
    quit_after: Option<Duration>,
}

impl App {
    /// Validate `config`, open the hardware and spawn every enabled
    /// activity.
    ///
    /// Fails when the sensor, a display whose policy is
    /// [`InitPolicy::Fatal`], or the HTTP listener cannot be set up.
    pub async fn start(config: AppConfig) -> Result<Self> {
        config.validate()?;
        info!("Starting pitemp in {:?} mode", config.mode);

        let store = Arc::new(ReadingStore::new());
        let mut coordinator = Coordinator::new();

        let metrics = match config.mode {
            Mode::Standalone | Mode::Server => Some(Arc::new(PrometheusMetrics::new()?)),
            Mode::Client => None,
        };

        // Everything that can fail is opened before the first spawn.
        let displays = open_displays(&config)?;
        let listener = match &config.web {
            Some(web_config) => Some(web::bind(web_config).await?),
            None => None,
        };
        let local_addr = listener.as_ref().and_then(|l| l.local_addr().ok());

        match config.mode {
            Mode::Standalone | Mode::Server => {
                let sensor = sensor::open_sensor(&config.sensor)?;
                let mut poller = SensorPoller::new(
                    sensor,
                    config.sensor.retries,
                    config.sensor.poll_interval,
                    store.clone(),
                );
                if let Some(metrics) = &metrics {
                    poller = poller.with_metrics(metrics.clone() as Arc<dyn MetricsSink>);
                }
                coordinator.spawn("sensor poller", Cleanup::None, |token| poller.run(token));
            }
            Mode::Client => {
                let remote = config
                    .remote
                    .as_ref()
                    .ok_or_else(|| PitempError::config_error("client mode requires a server URL"))?;
                let fetcher = RemoteFetcher::new(remote, store.clone())?;
                coordinator.spawn("remote fetcher", Cleanup::None, |token| fetcher.run(token));
            }
        }

        for (driver, display_config) in displays {
            let name = format!("{} display", display_config.kind);
            let updater = DisplayUpdater::new(driver, store.clone(), &display_config, &config.ip_iface);
            coordinator.spawn(name, Cleanup::Required, |token| updater.run(token));
        }

        if let (Some(listener), Some(web_config)) = (listener, config.web.clone()) {
            let stale_after = config
                .oled()
                .map(|d| d.stale_after)
                .unwrap_or(crate::config::DEFAULT_STALE_AFTER);
            let state = AppState::new(store.clone())
                .with_metrics(metrics.clone())
                .with_ip_iface(config.ip_iface.clone())
                .with_stale_after(stale_after);

            coordinator.spawn("web server", Cleanup::Required, move |token| async move {
                if let Err(e) = web::serve(listener, &web_config, state, token).await {
                    error!("{}", e);
                }
            });
        }

        Ok(Self {
            coordinator,
            store,
            local_addr,
            quit_after: config.quit_after,
        })
    }

    /// The store shared by every activity.
    pub fn store(&self) -> Arc<ReadingStore> {
        self.store.clone()
    }

    /// Address the HTTP server is listening on, if it runs.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Cancelling this token shuts the application down.
    pub fn token(&self) -> CancellationToken {
        self.coordinator.token()
    }

    /// Run until a signal, the auto-quit timer or the token stops the
    /// application, then shut down.
    pub async fn run(mut self) -> ShutdownSummary {
        self.coordinator.run(self.quit_after).await;
        self.coordinator.shutdown().await
    }
}

/// Start and run `config` to completion.
pub async fn run(config: AppConfig) -> Result<ShutdownSummary> {
    let app = App::start(config).await?;
    Ok(app.run().await)
}

type OpenedDisplay = (Box<dyn display::DisplayDriver>, crate::config::DisplayConfig);

fn open_displays(config: &AppConfig) -> Result<Vec<OpenedDisplay>> {
    let mut opened = Vec::new();
    for display_config in &config.displays {
        match display::open_display(display_config) {
            Ok(driver) => {
                info!("Opened {} display", display_config.kind);
                opened.push((driver, display_config.clone()));
            }
            Err(e) => match display_config.init_policy {
                InitPolicy::Fatal => return Err(e),
                InitPolicy::Disable => {
                    warn!("Running without {} display: {}", display_config.kind, e)
                }
            },
        }
    }
    Ok(opened)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DisplayConfig, RemoteConfig, SensorConfig};
    use crate::web::WebConfig;

    fn local_web() -> Option<WebConfig> {
        Some(WebConfig::new("127.0.0.1", 0))
    }

    fn missing_sensor() -> SensorConfig {
        SensorConfig {
            iio_device: std::env::temp_dir().join("pitemp-no-such-iio-device"),
            retries: 0,
            ..SensorConfig::default()
        }
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected() {
        let config = AppConfig::new(Mode::Client);
        assert!(matches!(App::start(config).await, Err(PitempError::Config(_))));
    }

    #[cfg(not(feature = "gpio"))]
    #[tokio::test]
    async fn test_fatal_display_aborts_startup() {
        let config = AppConfig::new(Mode::Standalone)
            .with_sensor(missing_sensor())
            .with_displays(vec![DisplayConfig::lcd().with_init_policy(InitPolicy::Fatal)]);
        assert!(matches!(
            App::start(config).await,
            Err(PitempError::DisplayInit(_))
        ));
    }

    #[cfg(not(feature = "gpio"))]
    #[tokio::test]
    async fn test_disabled_display_is_skipped() {
        let config = AppConfig::new(Mode::Standalone)
            .with_sensor(missing_sensor())
            .with_displays(vec![DisplayConfig::oled()]);
        let app = App::start(config).await.unwrap();
        app.token().cancel();

        let summary = app.run().await;
        assert_eq!(summary.activities.len(), 1);
        assert!(summary.outcome("sensor poller").is_some());
    }

    #[tokio::test]
    async fn test_client_mode_serves_without_metrics() {
        let config = AppConfig::new(Mode::Client)
            .with_remote(Some(RemoteConfig::new("http://127.0.0.1:9/api")))
            .with_displays(Vec::new())
            .with_web(local_web())
            .with_ip_iface("");
        let app = App::start(config).await.unwrap();
        let addr = app.local_addr().unwrap();

        let response = reqwest::get(format!("http://{}/metrics", addr)).await.unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);
        let response = reqwest::get(format!("http://{}/api", addr)).await.unwrap();
        assert!(response.status().is_success());

        app.token().cancel();
        let summary = app.run().await;
        assert_eq!(
            summary.outcome("web server"),
            Some(crate::lifecycle::ActivityOutcome::Completed)
        );
    }
}
