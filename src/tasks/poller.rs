//! Sensor poller: the store's writer in standalone and server deployments.

use crate::error::{PitempError, Result};
use crate::metrics::MetricsSink;
use crate::reading::{Reading, ReadingStore};
use crate::sensor::Sensor;
use crate::tasks::periodic::run_periodic;
use chrono::Utc;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Periodically reads the sensor into the store.
pub struct SensorPoller {
    sensor: Arc<Mutex<Box<dyn Sensor>>>,
    sensor_name: String,
    retries: u32,
    interval: Duration,
    store: Arc<ReadingStore>,
    metrics: Option<Arc<dyn MetricsSink>>,
}

impl SensorPoller {
    /// Create a poller reading `sensor` every `interval`.
    pub fn new(
        sensor: Box<dyn Sensor>,
        retries: u32,
        interval: Duration,
        store: Arc<ReadingStore>,
    ) -> Self {
        Self {
            sensor_name: sensor.name().to_string(),
            sensor: Arc::new(Mutex::new(sensor)),
            retries,
            interval,
            store,
            metrics: None,
        }
    }

    /// Also forward successful readings to `metrics`.
    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsSink>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Read the sensor once and publish the result.
    ///
    /// On failure the store keeps its previous reading.
    pub async fn poll_once(&self) -> Result<Reading> {
        let sensor = Arc::clone(&self.sensor);
        let retries = self.retries;

        // The driver blocks for up to `retries` conversion delays.
        let measurement = tokio::task::spawn_blocking(move || {
            let mut sensor = sensor.lock().unwrap_or_else(PoisonError::into_inner);
            sensor.read(retries)
        })
        .await
        .map_err(|e| PitempError::sensor_error(format!("sensor task failed: {}", e)))??;

        let reading = Reading::new(measurement.temperature, measurement.humidity, Utc::now());
        self.store.set(reading);
        if let Some(metrics) = &self.metrics {
            metrics.record(&reading);
        }

        Ok(reading)
    }

    async fn tick(&self) {
        match self.poll_once().await {
            Ok(reading) => debug!(
                "{}: {:.1}°C, {:.1}% humidity",
                self.sensor_name,
                reading.temperature(),
                reading.humidity()
            ),
            Err(e) => warn!("Failed to read {}: {}", self.sensor_name, e),
        }
    }

    /// Poll until `token` is cancelled.
    pub async fn run(self, token: CancellationToken) {
        info!(
            "Polling {} every {:?} ({} retries)",
            self.sensor_name, self.interval, self.retries
        );
        run_periodic(&token, self.interval, || self.tick()).await;
        info!("Sensor poller stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensor::Measurement;
    use std::collections::VecDeque;

    /// Sensor replaying a scripted sequence of results.
    struct ScriptedSensor {
        script: VecDeque<Option<(f32, f32)>>,
    }

    impl Sensor for ScriptedSensor {
        fn name(&self) -> &str {
            "scripted"
        }

        fn read(&mut self, _retries: u32) -> Result<Measurement> {
            match self.script.pop_front().flatten() {
                Some((temperature, humidity)) => Ok(Measurement {
                    temperature,
                    humidity,
                }),
                None => Err(PitempError::sensor_error("no response")),
            }
        }
    }

    fn poller(script: Vec<Option<(f32, f32)>>, store: Arc<ReadingStore>) -> SensorPoller {
        SensorPoller::new(
            Box::new(ScriptedSensor {
                script: script.into(),
            }),
            0,
            Duration::from_secs(60),
            store,
        )
    }

    #[tokio::test]
    async fn test_successful_poll_sets_store() {
        let store = Arc::new(ReadingStore::new());
        let poller = poller(vec![Some((21.5, 40.0))], store.clone());

        let before = Utc::now();
        let reading = poller.poll_once().await.unwrap();
        let after = Utc::now();

        assert_eq!(store.get(), reading);
        assert_eq!(reading.temperature(), 21.5);
        assert_eq!(reading.humidity(), 40.0);
        let captured = reading.captured_at().unwrap();
        assert!(captured >= before && captured <= after);
    }

    #[tokio::test]
    async fn test_failed_poll_keeps_previous_reading() {
        let store = Arc::new(ReadingStore::new());
        let poller = poller(vec![Some((21.5, 40.0)), None], store.clone());

        let good = poller.poll_once().await.unwrap();
        assert!(poller.poll_once().await.is_err());
        assert_eq!(store.get(), good);
    }

    #[tokio::test]
    async fn test_failed_first_poll_leaves_zero_reading() {
        let store = Arc::new(ReadingStore::new());
        let poller = poller(vec![None], store.clone());

        assert!(poller.poll_once().await.is_err());
        assert_eq!(store.get(), Reading::default());
    }
}
