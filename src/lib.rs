//! # pitemp - Raspberry Pi temperature and humidity monitor
//!
//! Samples a DHT11 sensor, shows the latest reading on a 20x4 character LCD
//! and/or a 128x32 PiOLED, and serves it over HTTP as an HTML page, a JSON
//! API, Prometheus metrics and a PNG preview of the OLED. A second Pi can run
//! in client mode and mirror a server's reading onto its own display.
//!
//! ## Architecture
//!
//! - One [`ReadingStore`] holds the latest [`Reading`]. Exactly one
//!   activity writes it: a [`SensorPoller`] or a [`RemoteFetcher`].
//! - Every display gets a [`DisplayUpdater`]; the HTTP handlers read the
//!   store on each request.
//! - All activities are [`run_periodic`] loops spawned by a [`Coordinator`]
//!   and stopped through one cancellation token.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pitemp::{AppConfig, Mode};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AppConfig::new(Mode::Server);
//!     pitemp::app::run(config).await?;
//!     Ok(())
//! }
//! ```

pub mod app;
pub mod config;
pub mod display;
pub mod error;
pub mod lifecycle;
pub mod metrics;
pub mod net;
pub mod reading;
pub mod sensor;
pub mod tasks;
pub mod web;

// Re-export public API
pub use app::App;
pub use config::{AppConfig, DisplayConfig, DisplayKind, InitPolicy, Mode, RemoteConfig, SensorConfig, SensorKind};
pub use display::{DisplayDriver, DisplayUpdater, Frame};
pub use error::{PitempError, Result};
pub use lifecycle::{Cleanup, Coordinator, LifecycleState, ShutdownSummary};
pub use metrics::{MetricsSink, PrometheusMetrics};
pub use reading::{ApiReading, Reading, ReadingStore};
pub use sensor::{Measurement, Sensor};
pub use tasks::{run_periodic, RemoteFetcher, SensorPoller};
pub use web::{AppState, WebConfig};

/// The default web server port
pub const DEFAULT_WEB_PORT: u16 = 8080;
