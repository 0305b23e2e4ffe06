//! DHT11 bit-banged on a Raspberry Pi GPIO pin.
//!
//! Userspace timing is best effort: the scheduler regularly makes us miss a
//! bit, which shows up as a timeout or checksum error and is retried.

use super::{with_retries, Measurement, Sensor, DHT11_RETRY_DELAY};
use crate::error::{PitempError, Result};
use rppal::gpio::{Gpio, IoPin, Mode, PullUpDown};
use std::thread;
use std::time::{Duration, Instant};

// Host start signal: hold the line low for at least 18ms.
const START_SIGNAL: Duration = Duration::from_millis(20);
const EDGE_TIMEOUT: Duration = Duration::from_micros(200);
// A high pulse longer than this is a 1 bit (0 ≈ 27µs, 1 ≈ 70µs).
const ONE_THRESHOLD: Duration = Duration::from_micros(48);

/// DHT11 driven directly through `rppal`.
pub struct GpioDht11 {
    pin: IoPin,
    pin_number: u8,
}

impl GpioDht11 {
    /// Claim `pin` (BCM numbering) for the sensor's data line.
    pub fn new(pin: u8) -> Result<Self> {
        let gpio = Gpio::new()
            .map_err(|e| PitempError::gpio_error(format!("Failed to initialize GPIO: {}", e)))?;
        let io = gpio
            .get(pin)
            .map_err(|e| PitempError::gpio_error(format!("Failed to access pin {}: {}", pin, e)))?
            .into_io(Mode::Output);

        Ok(Self {
            pin: io,
            pin_number: pin,
        })
    }

    /// Busy-wait until the line reaches `high`, returning how long it took.
    fn wait_for(&self, high: bool) -> Result<Duration> {
        let start = Instant::now();
        while self.pin.is_high() != high {
            if start.elapsed() > EDGE_TIMEOUT {
                return Err(PitempError::sensor_error(format!(
                    "timed out waiting for {} on pin {}",
                    if high { "high" } else { "low" },
                    self.pin_number
                )));
            }
        }
        Ok(start.elapsed())
    }

    fn read_once(&mut self) -> Result<Measurement> {
        self.pin.set_mode(Mode::Output);
        self.pin.set_low();
        thread::sleep(START_SIGNAL);
        self.pin.set_high();
        self.pin.set_mode(Mode::Input);
        self.pin.set_pullupdown(PullUpDown::PullUp);

        // Sensor response: low ~80µs, high ~80µs, then the first bit.
        self.wait_for(false)?;
        self.wait_for(true)?;
        self.wait_for(false)?;

        let mut data = [0u8; 5];
        for bit in 0..40 {
            self.wait_for(true)?;
            let high_for = self.wait_for(false)?;
            if high_for > ONE_THRESHOLD {
                data[bit / 8] |= 1 << (7 - bit % 8);
            }
        }

        decode_frame(&data)
    }
}

/// Decode the five data bytes of a DHT11 transmission.
pub(crate) fn decode_frame(data: &[u8; 5]) -> Result<Measurement> {
    let checksum = data[..4].iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
    if checksum != data[4] {
        return Err(PitempError::sensor_error(format!(
            "checksum mismatch: computed {:#04x}, received {:#04x}",
            checksum, data[4]
        )));
    }

    let humidity = data[0] as f32 + data[1] as f32 / 10.0;
    let mut temperature = data[2] as f32 + (data[3] & 0x7f) as f32 / 10.0;
    if data[3] & 0x80 != 0 {
        temperature = -temperature;
    }

    Ok(Measurement {
        temperature,
        humidity,
    })
}

impl Sensor for GpioDht11 {
    fn name(&self) -> &str {
        "dht11-gpio"
    }

    fn read(&mut self, retries: u32) -> Result<Measurement> {
        with_retries(retries, DHT11_RETRY_DELAY, || self.read_once())
    }
}
