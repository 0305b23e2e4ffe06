//! Local displays.
//!
//! Each attached display is driven by its own [`DisplayUpdater`]. Layouts are
//! pure functions of a [`Frame`] so they can be tested (and, for the OLED,
//! served as a PNG) without hardware; the drivers behind the `gpio` feature
//! only move the result onto the bus.

pub mod canvas;
pub mod lcd;
pub mod oled;
pub mod updater;

use crate::config::{DisplayConfig, DisplayKind};
use crate::error::Result;
use crate::reading::Reading;
use chrono::{DateTime, Local, Utc};
use std::time::Duration;

pub use canvas::Canvas;
pub use updater::{DisplayGuard, DisplayUpdater};

/// Clock format shown on every display, e.g. `Mon Jan 2 15:04:05`.
pub const CLOCK_FORMAT: &str = "%a %b %-d %H:%M:%S";

/// Everything a display needs to draw one refresh.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Reading to show
    pub reading: Reading,
    /// Local wall-clock time of the refresh
    pub now: DateTime<Local>,
    /// Interface address (or lookup error text); `None` when not configured
    pub ip: Option<String>,
    /// Whether the reading is older than the display's threshold
    pub stale: bool,
}

impl Frame {
    /// Build a frame, flagging the reading as stale when it is older than
    /// `stale_after` at `now`.
    pub fn new(reading: Reading, now: DateTime<Local>, ip: Option<String>, stale_after: Duration) -> Self {
        let stale = reading.is_stale(now.with_timezone(&Utc), stale_after);
        Self {
            reading,
            now,
            ip,
            stale,
        }
    }

    /// The clock line.
    pub fn clock(&self) -> String {
        self.now.format(CLOCK_FORMAT).to_string()
    }
}

/// A physical display.
pub trait DisplayDriver: Send {
    /// Which kind of display this is.
    fn kind(&self) -> DisplayKind;

    /// Draw `frame`.
    fn render(&mut self, frame: &Frame) -> Result<()>;

    /// Blank the display and release the bus. Called exactly once.
    fn cleanup(&mut self) -> Result<()>;
}

/// Format an age the way the LCD shows freshness: `42s`, `1m5s`, `2h0m7s`.
pub fn format_age(age: chrono::Duration) -> String {
    let millis = age.num_milliseconds().max(0);
    let total = (millis + 500) / 1000;
    let (hours, minutes, seconds) = (total / 3600, total % 3600 / 60, total % 60);

    if hours > 0 {
        format!("{}h{}m{}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m{}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}

/// Open the hardware described by `config`.
#[cfg(feature = "gpio")]
pub fn open_display(config: &DisplayConfig) -> Result<Box<dyn DisplayDriver>> {
    match config.kind {
        DisplayKind::Lcd => Ok(Box::new(lcd::Hd44780Lcd::new(config)?)),
        DisplayKind::Oled => Ok(Box::new(oled::Ssd1306Oled::new(config.clear_on_exit)?)),
    }
}

/// Open the hardware described by `config`.
#[cfg(not(feature = "gpio"))]
pub fn open_display(config: &DisplayConfig) -> Result<Box<dyn DisplayDriver>> {
    Err(crate::error::PitempError::display_init_error(format!(
        "{} display requested but pitemp was built without the gpio feature",
        config.kind
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_age() {
        assert_eq!(format_age(chrono::Duration::zero()), "0s");
        assert_eq!(format_age(chrono::Duration::milliseconds(41_600)), "42s");
        assert_eq!(format_age(chrono::Duration::seconds(65)), "1m5s");
        assert_eq!(format_age(chrono::Duration::seconds(7207)), "2h0m7s");
        assert_eq!(format_age(chrono::Duration::seconds(-3)), "0s");
    }

    #[test]
    fn test_frame_staleness() {
        let now = Local.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let captured = (now - chrono::Duration::minutes(4)).with_timezone(&Utc);
        let reading = Reading::new(20.0, 30.0, captured);

        assert!(Frame::new(reading, now, None, Duration::from_secs(180)).stale);
        assert!(!Frame::new(reading, now, None, Duration::from_secs(300)).stale);
        assert!(!Frame::new(Reading::default(), now, None, Duration::ZERO).stale);
    }

    #[test]
    fn test_clock_format() {
        let now = Local.with_ymd_and_hms(2006, 1, 2, 15, 4, 5).unwrap();
        let frame = Frame::new(Reading::default(), now, None, Duration::ZERO);
        assert_eq!(frame.clock(), "Mon Jan 2 15:04:05");
    }

    #[cfg(not(feature = "gpio"))]
    #[test]
    fn test_open_display_without_gpio_fails() {
        let result = open_display(&DisplayConfig::oled());
        assert!(matches!(result, Err(crate::error::PitempError::DisplayInit(_))));
    }
}
