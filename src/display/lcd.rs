//! 20x4 HD44780 character LCD.

use super::{format_age, Frame};

/// Columns per LCD line.
pub const LCD_COLUMNS: usize = 20;
/// Number of LCD lines.
pub const LCD_LINES: usize = 4;

/// Degree sign in the HD44780 A00 character ROM (a Japanese handakuten).
pub const DEGREE_SYMBOL: u8 = 0xdf;

/// Text of the four LCD lines, each exactly [`LCD_COLUMNS`] characters.
///
/// Line 1 shows `message` until the first reading arrives. `°` is
/// translated to the panel's degree glyph by [`to_rom`].
pub fn lcd_lines(frame: &Frame, message: &str) -> [String; LCD_LINES] {
    let reading = &frame.reading;

    let status = match reading.age(frame.now.with_timezone(&chrono::Utc)) {
        Some(age) => format!("Freshness: {}", format_age(age)),
        None => message.to_string(),
    };

    let ip = frame.ip.clone().unwrap_or_default();

    let sensor = if reading.is_captured() {
        format!(
            "{:.0}°C, {:.0}% humid",
            reading.temperature(),
            reading.humidity()
        )
    } else {
        "[waiting for dht11]".to_string()
    };

    [status, ip, sensor, frame.clock()].map(|line| pad_line(&line))
}

/// Pad with blanks or truncate to exactly one LCD line.
fn pad_line(line: &str) -> String {
    let mut padded: String = line.chars().take(LCD_COLUMNS).collect();
    let len = padded.chars().count();
    padded.extend(std::iter::repeat(' ').take(LCD_COLUMNS - len));
    padded
}

/// Character ROM codes for `line`, with `°` mapped to `degree_symbol`.
/// Anything else outside ASCII becomes `?`.
pub fn to_rom(line: &str, degree_symbol: u8) -> Vec<u8> {
    line.chars()
        .map(|c| match c {
            '°' => degree_symbol,
            c if c.is_ascii() && !c.is_ascii_control() => c as u8,
            _ => b'?',
        })
        .collect()
}

#[cfg(feature = "gpio")]
pub use hardware::Hd44780Lcd;

#[cfg(feature = "gpio")]
mod hardware {
    use super::{lcd_lines, to_rom, LCD_COLUMNS};
    use crate::config::{DisplayConfig, DisplayKind};
    use crate::display::{DisplayDriver, Frame};
    use crate::error::{PitempError, Result};
    use rppal::i2c::I2c;
    use std::thread;
    use std::time::Duration;

    // PCF8574 backpack pin mapping.
    const RS: u8 = 0b0000_0001;
    const ENABLE: u8 = 0b0000_0100;
    const BACKLIGHT: u8 = 0b0000_1000;

    const CMD_CLEAR: u8 = 0x01;
    const CMD_ENTRY_MODE: u8 = 0x06;
    const CMD_DISPLAY_ON: u8 = 0x0c;
    const CMD_FUNCTION_4BIT_2LINE: u8 = 0x28;
    const CMD_SET_DDRAM: u8 = 0x80;

    const LINE_OFFSETS: [u8; 4] = [0x00, 0x40, 0x14, 0x54];

    /// HD44780 in 4-bit mode behind a PCF8574 I²C expander.
    pub struct Hd44780Lcd {
        i2c: I2c,
        backlight: u8,
        clear_on_exit: bool,
        message: String,
        degree_symbol: u8,
    }

    impl Hd44780Lcd {
        /// Open the LCD at the configured address on I²C bus 1 and switch the
        /// backlight on.
        pub fn new(config: &DisplayConfig) -> Result<Self> {
            let address = config.i2c_address;
            let mut i2c = I2c::new()
                .map_err(|e| PitempError::display_init_error(format!("failed to open I²C: {}", e)))?;
            i2c.set_slave_address(address).map_err(|e| {
                PitempError::display_init_error(format!("failed to address LCD at {:#04x}: {}", address, e))
            })?;

            let mut lcd = Self {
                i2c,
                backlight: BACKLIGHT,
                clear_on_exit: config.clear_on_exit,
                message: config.message.clone(),
                degree_symbol: config.degree_symbol,
            };
            lcd.init()
                .map_err(|e| PitempError::display_init_error(format!("failed to initialize LCD: {}", e)))?;
            Ok(lcd)
        }

        fn init(&mut self) -> Result<()> {
            thread::sleep(Duration::from_millis(50));
            // Force 8-bit mode three times, then switch to 4-bit.
            for _ in 0..3 {
                self.write_nibble(0x30, 0)?;
                thread::sleep(Duration::from_micros(4500));
            }
            self.write_nibble(0x20, 0)?;

            self.command(CMD_FUNCTION_4BIT_2LINE)?;
            self.command(CMD_DISPLAY_ON)?;
            self.command(CMD_CLEAR)?;
            thread::sleep(Duration::from_millis(2));
            self.command(CMD_ENTRY_MODE)
        }

        fn expander_write(&mut self, value: u8) -> Result<()> {
            self.i2c
                .write(&[value | self.backlight])
                .map_err(|e| PitempError::display_error(format!("I²C write failed: {}", e)))?;
            Ok(())
        }

        fn write_nibble(&mut self, nibble: u8, mode: u8) -> Result<()> {
            let data = (nibble & 0xf0) | mode;
            self.expander_write(data | ENABLE)?;
            thread::sleep(Duration::from_micros(1));
            self.expander_write(data)?;
            thread::sleep(Duration::from_micros(50));
            Ok(())
        }

        fn send(&mut self, byte: u8, mode: u8) -> Result<()> {
            self.write_nibble(byte & 0xf0, mode)?;
            self.write_nibble(byte << 4, mode)
        }

        fn command(&mut self, command: u8) -> Result<()> {
            self.send(command, 0)
        }

        fn show_line(&mut self, line: usize, text: &str) -> Result<()> {
            self.command(CMD_SET_DDRAM | LINE_OFFSETS[line])?;
            for byte in to_rom(text, self.degree_symbol).into_iter().take(LCD_COLUMNS) {
                self.send(byte, RS)?;
            }
            Ok(())
        }
    }

    impl DisplayDriver for Hd44780Lcd {
        fn kind(&self) -> DisplayKind {
            DisplayKind::Lcd
        }

        fn render(&mut self, frame: &Frame) -> Result<()> {
            let mut failed = Vec::new();
            for (i, line) in lcd_lines(frame, &self.message).iter().enumerate() {
                // Keep going so one bad line doesn't blank the rest.
                if let Err(e) = self.show_line(i, line) {
                    failed.push(format!("line {}: {}", i + 1, e));
                }
            }
            if failed.is_empty() {
                Ok(())
            } else {
                Err(PitempError::display_error(failed.join("; ")))
            }
        }

        fn cleanup(&mut self) -> Result<()> {
            if !self.clear_on_exit {
                return Ok(());
            }
            self.command(CMD_CLEAR)?;
            thread::sleep(Duration::from_millis(2));
            self.backlight = 0;
            self.expander_write(0)
        }
    }
}
