//! Temperature/humidity sensor drivers.
//!
//! Drivers are blocking: a call to [`Sensor::read`] may take several seconds
//! while it retries. Callers run them on the blocking thread pool.

pub mod iio;

#[cfg(feature = "gpio")]
pub mod gpio;

use crate::config::{SensorConfig, SensorKind};
use crate::error::{PitempError, Result};
use std::time::Duration;

pub use iio::IioDht11;

#[cfg(feature = "gpio")]
pub use gpio::GpioDht11;

/// Minimum time the DHT11 needs between two conversions.
pub const DHT11_RETRY_DELAY: Duration = Duration::from_millis(1500);

/// A single raw sample from a sensor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    /// Temperature in degrees Celsius
    pub temperature: f32,
    /// Relative humidity in percent
    pub humidity: f32,
}

/// A blocking temperature/humidity sensor.
pub trait Sensor: Send {
    /// Human readable driver name, used in logs.
    fn name(&self) -> &str;

    /// Take a measurement, making at most `retries + 1` attempts.
    fn read(&mut self, retries: u32) -> Result<Measurement>;
}

/// Run `attempt` until it succeeds or the retry budget is spent, sleeping
/// `delay` between attempts. The last error is returned.
pub(crate) fn with_retries<F>(retries: u32, delay: Duration, mut attempt: F) -> Result<Measurement>
where
    F: FnMut() -> Result<Measurement>,
{
    let mut tries = 0;
    loop {
        match attempt() {
            Ok(measurement) => return Ok(measurement),
            Err(err) if tries < retries => {
                tries += 1;
                tracing::debug!("Sensor attempt {} failed: {}", tries, err);
                if !delay.is_zero() {
                    std::thread::sleep(delay);
                }
            }
            Err(err) => {
                return Err(PitempError::sensor_error(format!(
                    "giving up after {} attempts: {}",
                    tries + 1,
                    err
                )))
            }
        }
    }
}

/// Open the sensor described by `config`.
pub fn open_sensor(config: &SensorConfig) -> Result<Box<dyn Sensor>> {
    match config.kind {
        SensorKind::Iio => Ok(Box::new(IioDht11::new(&config.iio_device))),
        #[cfg(feature = "gpio")]
        SensorKind::Gpio => Ok(Box::new(GpioDht11::new(config.pin)?)),
        #[cfg(not(feature = "gpio"))]
        SensorKind::Gpio => Err(PitempError::config_error(format!(
            "GPIO sensor on pin {} requested but pitemp was built without the gpio feature",
            config.pin
        ))),
    }
}
