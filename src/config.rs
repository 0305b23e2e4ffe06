//! Application configuration.
//!
//! One [`AppConfig`] describes every deployment: which acquisition source
//! feeds the store, which displays are attached and whether the HTTP layer
//! runs. The binary builds it from command-line flags.

use crate::display::lcd::DEGREE_SYMBOL;
use crate::error::{PitempError, Result};
use crate::web::WebConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default sensor poll interval.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);
/// Default number of sensor retries per poll.
pub const DEFAULT_SENSOR_RETRIES: u32 = 10;
/// Default BCM pin of the DHT11 data line.
pub const DEFAULT_SENSOR_PIN: u8 = 4;
/// Default IIO device directory of the kernel DHT11 driver.
pub const DEFAULT_IIO_DEVICE: &str = "/sys/bus/iio/devices/iio:device0";
/// Default peer fetch interval in client mode.
pub const DEFAULT_FETCH_INTERVAL: Duration = Duration::from_secs(60);
/// Default LCD refresh interval.
pub const DEFAULT_LCD_INTERVAL: Duration = Duration::from_secs(2);
/// Default OLED refresh interval.
pub const DEFAULT_OLED_INTERVAL: Duration = Duration::from_millis(500);
/// Default age after which a reading is flagged as stale.
pub const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(3 * 60);
/// Default I²C address of the LCD's PCF8574 backpack.
pub const DEFAULT_LCD_ADDRESS: u16 = 0x27;
/// Default LCD line 1 text shown until the first reading.
pub const DEFAULT_LCD_MESSAGE: &str = "[LCD live]";
/// Default network interface shown on the displays.
pub const DEFAULT_IP_IFACE: &str = "wlan0";

/// Deployment mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Local sensor and displays only
    Standalone,
    /// Local sensor, displays and the HTTP API
    Server,
    /// No sensor; mirror a peer's API onto local displays
    Client,
}

/// Which sensor driver to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SensorKind {
    /// Kernel IIO driver (`dtoverlay=dht11`)
    Iio,
    /// Userspace bit-banging through rppal (requires the gpio feature)
    Gpio,
}

/// Sensor poller configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorConfig {
    /// Driver selection
    pub kind: SensorKind,
    /// BCM pin for the GPIO driver
    pub pin: u8,
    /// IIO device directory for the IIO driver
    pub iio_device: PathBuf,
    /// Time between polls
    pub poll_interval: Duration,
    /// Retries the driver performs per poll
    pub retries: u32,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            kind: SensorKind::Iio,
            pin: DEFAULT_SENSOR_PIN,
            iio_device: PathBuf::from(DEFAULT_IIO_DEVICE),
            poll_interval: DEFAULT_POLL_INTERVAL,
            retries: DEFAULT_SENSOR_RETRIES,
        }
    }
}

/// Remote fetcher configuration (client mode).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Peer API URL, including the `/api` path
    pub url: String,
    /// Time between fetches
    pub fetch_interval: Duration,
    /// Per-request timeout
    pub timeout: Duration,
}

impl RemoteConfig {
    /// Create a remote configuration for `url` with default timings.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            fetch_interval: DEFAULT_FETCH_INTERVAL,
            timeout: Duration::from_secs(10),
        }
    }
}

/// Kind of attached display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayKind {
    /// 20x4 HD44780 character LCD behind a PCF8574 I²C backpack
    Lcd,
    /// 128x32 SSD1306 pixel OLED
    Oled,
}

impl std::fmt::Display for DisplayKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DisplayKind::Lcd => write!(f, "lcd"),
            DisplayKind::Oled => write!(f, "oled"),
        }
    }
}

/// What to do when a display cannot be opened at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum InitPolicy {
    /// Abort startup
    Fatal,
    /// Log and run without this display
    Disable,
}

/// Configuration of one display updater.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// Display type
    pub kind: DisplayKind,
    /// Time between refreshes
    pub refresh_interval: Duration,
    /// Age after which the reading is flagged as stale
    pub stale_after: Duration,
    /// Behavior when the display cannot be opened
    pub init_policy: InitPolicy,
    /// Blank the display (and switch off the backlight) on shutdown
    pub clear_on_exit: bool,
    /// I²C address (LCD only; the OLED uses its fixed address)
    pub i2c_address: u16,
    /// LCD line 1 text before the first reading
    pub message: String,
    /// Character ROM code used for `°` on the LCD
    pub degree_symbol: u8,
}

impl DisplayConfig {
    /// Default configuration for a character LCD.
    pub fn lcd() -> Self {
        Self {
            kind: DisplayKind::Lcd,
            refresh_interval: DEFAULT_LCD_INTERVAL,
            stale_after: DEFAULT_STALE_AFTER,
            init_policy: InitPolicy::Disable,
            clear_on_exit: true,
            i2c_address: DEFAULT_LCD_ADDRESS,
            message: DEFAULT_LCD_MESSAGE.to_string(),
            degree_symbol: DEGREE_SYMBOL,
        }
    }

    /// Default configuration for a pixel OLED.
    pub fn oled() -> Self {
        Self {
            kind: DisplayKind::Oled,
            refresh_interval: DEFAULT_OLED_INTERVAL,
            stale_after: DEFAULT_STALE_AFTER,
            init_policy: InitPolicy::Disable,
            clear_on_exit: true,
            i2c_address: 0x3c,
            message: DEFAULT_LCD_MESSAGE.to_string(),
            degree_symbol: DEGREE_SYMBOL,
        }
    }

    /// Set the refresh interval.
    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    /// Set the staleness threshold.
    pub fn with_stale_after(mut self, stale_after: Duration) -> Self {
        self.stale_after = stale_after;
        self
    }

    /// Set the initialization failure policy.
    pub fn with_init_policy(mut self, policy: InitPolicy) -> Self {
        self.init_policy = policy;
        self
    }

    /// Set whether the display is blanked on exit.
    pub fn with_clear_on_exit(mut self, clear: bool) -> Self {
        self.clear_on_exit = clear;
        self
    }

    /// Set the I²C address.
    pub fn with_i2c_address(mut self, address: u16) -> Self {
        self.i2c_address = address;
        self
    }

    /// Set the LCD line 1 text shown before the first reading.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Set the character ROM code used for `°`.
    pub fn with_degree_symbol(mut self, code: u8) -> Self {
        self.degree_symbol = code;
        self
    }
}

/// Complete configuration of a pitemp process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Deployment mode
    pub mode: Mode,
    /// Sensor settings (ignored in client mode)
    pub sensor: SensorConfig,
    /// Peer settings (client mode only)
    pub remote: Option<RemoteConfig>,
    /// Attached displays
    pub displays: Vec<DisplayConfig>,
    /// HTTP settings; `None` disables the HTTP layer
    pub web: Option<WebConfig>,
    /// Interface whose address is displayed; empty disables the lookup
    pub ip_iface: String,
    /// Quit automatically after this long
    pub quit_after: Option<Duration>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            mode: Mode::Server,
            sensor: SensorConfig::default(),
            remote: None,
            displays: vec![DisplayConfig::oled()],
            web: Some(WebConfig::default()),
            ip_iface: DEFAULT_IP_IFACE.to_string(),
            quit_after: None,
        }
    }
}

impl AppConfig {
    /// Create a configuration for `mode` with default settings.
    pub fn new(mode: Mode) -> Self {
        let web = match mode {
            Mode::Standalone => None,
            Mode::Server | Mode::Client => Some(WebConfig::default()),
        };
        Self {
            mode,
            web,
            ..Default::default()
        }
    }

    /// Set the sensor configuration.
    pub fn with_sensor(mut self, sensor: SensorConfig) -> Self {
        self.sensor = sensor;
        self
    }

    /// Set the remote peer.
    pub fn with_remote(mut self, remote: Option<RemoteConfig>) -> Self {
        self.remote = remote;
        self
    }

    /// Set the attached displays.
    pub fn with_displays(mut self, displays: Vec<DisplayConfig>) -> Self {
        self.displays = displays;
        self
    }

    /// Set or disable the web server.
    pub fn with_web(mut self, web: Option<WebConfig>) -> Self {
        self.web = web;
        self
    }

    /// Set the displayed network interface.
    pub fn with_ip_iface(mut self, iface: impl Into<String>) -> Self {
        self.ip_iface = iface.into();
        self
    }

    /// Set the auto-quit delay.
    pub fn with_quit_after(mut self, quit_after: Option<Duration>) -> Self {
        self.quit_after = quit_after;
        self
    }

    /// The configuration of the OLED display, if one is attached.
    pub fn oled(&self) -> Option<&DisplayConfig> {
        self.displays.iter().find(|d| d.kind == DisplayKind::Oled)
    }

    /// Check the configuration for contradictions.
    pub fn validate(&self) -> Result<()> {
        match (self.mode, &self.remote) {
            (Mode::Client, None) => {
                return Err(PitempError::config_error(
                    "client mode requires a server URL (--server)",
                ))
            }
            (Mode::Client, Some(remote)) => {
                if remote.url.trim().is_empty() {
                    return Err(PitempError::config_error("server URL is empty"));
                }
                if remote.fetch_interval.is_zero() {
                    return Err(PitempError::config_error("fetch interval must be positive"));
                }
            }
            (_, Some(_)) => {
                return Err(PitempError::config_error(
                    "a server URL is only meaningful in client mode",
                ))
            }
            (_, None) => {
                if self.sensor.poll_interval.is_zero() {
                    return Err(PitempError::config_error("poll interval must be positive"));
                }
            }
        }

        for (i, display) in self.displays.iter().enumerate() {
            if display.refresh_interval.is_zero() {
                return Err(PitempError::config_error(format!(
                    "{} refresh interval must be positive",
                    display.kind
                )));
            }
            if self.displays[..i].iter().any(|d| d.kind == display.kind) {
                return Err(PitempError::config_error(format!(
                    "{} display configured twice",
                    display.kind
                )));
            }
        }

        if self.quit_after.is_some_and(|d| d.is_zero()) {
            return Err(PitempError::config_error(
                "quit-after must be positive; omit it to run forever",
            ));
        }

        Ok(())
    }
}

/// Parse a duration such as `500ms`, `2s`, `1m`, `3h` or `1m30s`.
///
/// A bare number is taken as seconds.
pub fn parse_duration(input: &str) -> Result<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(PitempError::config_error("empty duration"));
    }
    if let Ok(secs) = input.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }

    let mut total = Duration::ZERO;
    let mut rest = input;
    while !rest.is_empty() {
        let digits = rest
            .find(|c: char| !c.is_ascii_digit() && c != '.')
            .ok_or_else(|| PitempError::config_error(format!("missing unit in {:?}", input)))?;
        if digits == 0 {
            return Err(PitempError::config_error(format!("invalid duration {:?}", input)));
        }
        let value: f64 = rest[..digits]
            .parse()
            .map_err(|_| PitempError::config_error(format!("invalid number in {:?}", input)))?;
        rest = &rest[digits..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit())
            .unwrap_or(rest.len());
        let scale = match &rest[..unit_len] {
            "ms" => 0.001,
            "s" => 1.0,
            "m" => 60.0,
            "h" => 3600.0,
            unit => {
                return Err(PitempError::config_error(format!(
                    "unknown unit {:?} in {:?}",
                    unit, input
                )))
            }
        };
        rest = &rest[unit_len..];
        total = Duration::try_from_secs_f64(value * scale)
            .ok()
            .and_then(|part| total.checked_add(part))
            .ok_or_else(|| PitempError::config_error(format!("duration {:?} is too large", input)))?;
    }

    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("1m").unwrap(), Duration::from_secs(60));
        assert_eq!(parse_duration("1m30s").unwrap(), Duration::from_secs(90));
        assert_eq!(parse_duration("3h").unwrap(), Duration::from_secs(3 * 3600));
        assert_eq!(parse_duration("0").unwrap(), Duration::ZERO);
        assert_eq!(parse_duration("45").unwrap(), Duration::from_secs(45));
    }

    #[test]
    fn test_parse_duration_errors() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("5 parsecs").is_err());
        assert!(parse_duration("ms").is_err());
        assert!(parse_duration("10d").is_err());
        assert!(parse_duration("99999999999999999999h").is_err());
        assert!(parse_duration("18446744073709551615s1s").is_err());
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.mode, Mode::Server);
        assert!(config.oled().is_some());
    }

    #[test]
    fn test_client_requires_server_url() {
        let config = AppConfig::new(Mode::Client);
        assert!(matches!(config.validate(), Err(PitempError::Config(_))));

        let config = config.with_remote(Some(RemoteConfig::new("http://pi:8080/api")));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_duplicate_displays_rejected() {
        let config = AppConfig::new(Mode::Standalone)
            .with_displays(vec![DisplayConfig::lcd(), DisplayConfig::lcd()]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_standalone_has_no_web() {
        assert!(AppConfig::new(Mode::Standalone).web.is_none());
    }
}
