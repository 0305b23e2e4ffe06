//! Metrics export for readings.
//!
//! The sensor poller forwards every successful reading to a [`MetricsSink`].
//! [`PrometheusMetrics`] keeps the values in gauges served on `/metrics`.

pub mod exporter;

pub use exporter::PrometheusMetrics;

use crate::reading::Reading;

/// Receiver of successful readings.
pub trait MetricsSink: Send + Sync {
    /// Record a freshly captured reading.
    fn record(&self, reading: &Reading);
}
