//! Remote fetcher: mirrors a peer's `/api` into the local store.

use crate::config::RemoteConfig;
use crate::error::{PitempError, Result};
use crate::reading::{ApiReading, Reading, ReadingStore};
use crate::tasks::periodic::run_periodic;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Periodically copies the peer's reading into the local store.
pub struct RemoteFetcher {
    client: reqwest::Client,
    url: String,
    interval: Duration,
    store: Arc<ReadingStore>,
}

impl RemoteFetcher {
    /// Create a fetcher for the peer described by `config`.
    pub fn new(config: &RemoteConfig, store: Arc<ReadingStore>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| PitempError::config_error(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: config.url.clone(),
            interval: config.fetch_interval,
            store,
        })
    }

    /// Fetch the peer's reading once and publish it unchanged.
    ///
    /// The peer's capture time is kept as is. Network, status and decode
    /// failures leave the store untouched.
    pub async fn fetch_once(&self) -> Result<Reading> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| PitempError::fetch_error(format!("GET {} failed: {}", self.url, e)))?
            .error_for_status()
            .map_err(|e| PitempError::fetch_error(format!("GET {} failed: {}", self.url, e)))?;

        let body = response
            .bytes()
            .await
            .map_err(|e| PitempError::fetch_error(format!("reading body from {}: {}", self.url, e)))?;

        let api: ApiReading =
            serde_json::from_slice(&body).map_err(|e| PitempError::decode_error(e.to_string()))?;

        let reading = Reading::from(api);
        self.store.set(reading);
        Ok(reading)
    }

    async fn tick(&self) {
        debug!("Fetching reading from {}", self.url);
        if let Err(e) = self.fetch_once().await {
            warn!("{}", e);
        }
    }

    /// Fetch until `token` is cancelled.
    pub async fn run(self, token: CancellationToken) {
        info!("Mirroring {} every {:?}", self.url, self.interval);
        run_periodic(&token, self.interval, || self.tick()).await;
        info!("Remote fetcher stopped");
    }
}
