//! Prometheus gauges for the latest reading.

use super::MetricsSink;
use crate::error::{PitempError, Result};
use crate::reading::Reading;
use prometheus::{Encoder, Gauge, Opts, Registry, TextEncoder};

/// Gauge name for the temperature.
pub const TEMPERATURE_GAUGE: &str = "pitemp_temperature_celsius";
/// Gauge name for the humidity.
pub const HUMIDITY_GAUGE: &str = "pitemp_humidity_percent";
/// Gauge name for the capture time in unix seconds.
pub const LAST_UPDATE_GAUGE: &str = "pitemp_last_update";

/// Owns a private registry with the three reading gauges.
#[derive(Clone)]
pub struct PrometheusMetrics {
    registry: Registry,
    temperature: Gauge,
    humidity: Gauge,
    last_update: Gauge,
}

impl PrometheusMetrics {
    /// Create and register the gauges.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();
        let temperature = register_gauge(
            &registry,
            TEMPERATURE_GAUGE,
            "Current temperature as measured by DHT11",
        )?;
        let humidity = register_gauge(
            &registry,
            HUMIDITY_GAUGE,
            "Current humidity as measured by DHT11",
        )?;
        let last_update = register_gauge(&registry, LAST_UPDATE_GAUGE, "Last update time from DHT11")?;

        Ok(Self {
            registry,
            temperature,
            humidity,
            last_update,
        })
    }

    /// Render all gauges in the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(|e| PitempError::encode_error(e.to_string()))?;
        String::from_utf8(buffer).map_err(|e| PitempError::encode_error(e.to_string()))
    }

    /// Content type of [`PrometheusMetrics::encode`] output.
    pub fn content_type(&self) -> String {
        TextEncoder::new().format_type().to_string()
    }
}

fn register_gauge(registry: &Registry, name: &str, help: &str) -> Result<Gauge> {
    let gauge = Gauge::with_opts(Opts::new(name, help))
        .map_err(|e| PitempError::config_error(format!("invalid gauge {}: {}", name, e)))?;
    registry
        .register(Box::new(gauge.clone()))
        .map_err(|e| PitempError::config_error(format!("registering {}: {}", name, e)))?;
    Ok(gauge)
}

impl MetricsSink for PrometheusMetrics {
    fn record(&self, reading: &Reading) {
        self.temperature.set(f64::from(reading.temperature()));
        self.humidity.set(f64::from(reading.humidity()));
        if let Some(at) = reading.captured_at() {
            self.last_update.set(at.timestamp() as f64);
        }
    }
}
