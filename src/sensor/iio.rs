//! DHT11 through the Linux kernel IIO driver.
//!
//! With `dtoverlay=dht11,gpiopin=4` in `/boot/config.txt` the kernel exposes
//! the sensor under `/sys/bus/iio/devices/iio:deviceN`. Values are reported in
//! milli-degrees Celsius and milli-percent. Reads fail with `EIO` whenever the
//! kernel misses an edge, which is what the retry budget is for.

use super::{with_retries, Measurement, Sensor, DHT11_RETRY_DELAY};
use crate::error::{PitempError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const TEMPERATURE_FILE: &str = "in_temp_input";
const HUMIDITY_FILE: &str = "in_humidityrelative_input";

/// DHT11 read from an IIO sysfs device directory.
#[derive(Debug, Clone)]
pub struct IioDht11 {
    device: PathBuf,
    retry_delay: Duration,
}

impl IioDht11 {
    /// Create a driver for the IIO device directory `device`.
    pub fn new(device: impl AsRef<Path>) -> Self {
        Self {
            device: device.as_ref().to_path_buf(),
            retry_delay: DHT11_RETRY_DELAY,
        }
    }

    /// Override the delay between attempts.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    fn read_milli(&self, file: &str) -> Result<f32> {
        let path = self.device.join(file);
        let raw = fs::read_to_string(&path)?;
        let milli = raw.trim().parse::<i32>().map_err(|e| {
            PitempError::sensor_error(format!("invalid value {:?} in {}: {}", raw.trim(), path.display(), e))
        })?;
        Ok(milli as f32 / 1000.0)
    }

    fn read_once(&self) -> Result<Measurement> {
        let temperature = self.read_milli(TEMPERATURE_FILE)?;
        let humidity = self.read_milli(HUMIDITY_FILE)?;
        Ok(Measurement {
            temperature,
            humidity,
        })
    }
}

impl Sensor for IioDht11 {
    fn name(&self) -> &str {
        "dht11-iio"
    }

    fn read(&mut self, retries: u32) -> Result<Measurement> {
        with_retries(retries, self.retry_delay, || self.read_once())
    }
}
