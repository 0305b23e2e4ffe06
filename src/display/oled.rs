//! 128x32 SSD1306 "PiOLED" pixel display.

use super::Frame;
use embedded_graphics::{
    mono_font::{
        ascii::{FONT_4X6, FONT_6X10},
        MonoTextStyle,
    },
    pixelcolor::BinaryColor,
    prelude::*,
    primitives::{Line, PrimitiveStyle},
    text::{Baseline, Text},
};

/// Height of one line in the large font.
const LINE_HEIGHT: i32 = 10;

/// The two large text lines for `frame`.
pub fn oled_lines(frame: &Frame) -> [String; 2] {
    let reading = &frame.reading;
    if !reading.is_captured() {
        return ["waiting for".to_string(), "sensor data".to_string()];
    }

    let mut temperature = format!("Temp: {:.0}C", reading.temperature());
    if frame.stale {
        temperature.push_str(" STALE!");
    }
    [temperature, format!("Humid: {:.0}%", reading.humidity())]
}

/// Draw `frame` onto `target`: two text lines at the top, a rule, and the
/// clock in a small font along the bottom edge.
pub fn draw_frame<D>(target: &mut D, frame: &Frame) -> Result<(), D::Error>
where
    D: DrawTarget<Color = BinaryColor>,
{
    target.clear(BinaryColor::Off)?;

    let large = MonoTextStyle::new(&FONT_6X10, BinaryColor::On);
    let small = MonoTextStyle::new(&FONT_4X6, BinaryColor::On);

    for (i, line) in oled_lines(frame).iter().enumerate() {
        Text::with_baseline(line, Point::new(0, i as i32 * LINE_HEIGHT), large, Baseline::Top)
            .draw(target)?;
    }

    let bounds = target.bounding_box();
    let bottom = bounds.size.height as i32 - 1;
    let rule_y = bottom - FONT_4X6.character_size.height as i32 - 1;
    Line::new(
        Point::new(0, rule_y),
        Point::new(bounds.size.width as i32 - 1, rule_y),
    )
    .into_styled(PrimitiveStyle::with_stroke(BinaryColor::On, 1))
    .draw(target)?;

    Text::with_baseline(&frame.clock(), Point::new(0, bottom), small, Baseline::Bottom)
        .draw(target)?;

    Ok(())
}

#[cfg(feature = "gpio")]
pub use hardware::Ssd1306Oled;

#[cfg(feature = "gpio")]
mod hardware {
    use super::draw_frame;
    use crate::config::DisplayKind;
    use crate::display::{DisplayDriver, Frame};
    use crate::error::{PitempError, Result};
    use embedded_graphics::pixelcolor::BinaryColor;
    use embedded_graphics::prelude::*;
    use rppal::i2c::I2c;
    use ssd1306::{
        mode::BufferedGraphicsMode, prelude::*, size::DisplaySize128x32, I2CDisplayInterface,
        Ssd1306,
    };

    type Panel = Ssd1306<I2CInterface<I2c>, DisplaySize128x32, BufferedGraphicsMode<DisplaySize128x32>>;

    /// SSD1306 on I²C bus 1, mounted upside down as on the Adafruit PiOLED.
    pub struct Ssd1306Oled {
        panel: Panel,
        clear_on_exit: bool,
    }

    impl Ssd1306Oled {
        /// Open and initialize the panel.
        pub fn new(clear_on_exit: bool) -> Result<Self> {
            let i2c = I2c::new()
                .map_err(|e| PitempError::display_init_error(format!("failed to open I²C: {}", e)))?;
            let interface = I2CDisplayInterface::new(i2c);
            let mut panel = Ssd1306::new(interface, DisplaySize128x32, DisplayRotation::Rotate180)
                .into_buffered_graphics_mode();
            panel.init().map_err(|e| {
                PitempError::display_init_error(format!("failed to initialize ssd1306: {:?}", e))
            })?;

            Ok(Self {
                panel,
                clear_on_exit,
            })
        }
    }

    impl DisplayDriver for Ssd1306Oled {
        fn kind(&self) -> DisplayKind {
            DisplayKind::Oled
        }

        fn render(&mut self, frame: &Frame) -> Result<()> {
            draw_frame(&mut self.panel, frame)
                .map_err(|e| PitempError::display_error(format!("drawing frame: {:?}", e)))?;
            self.panel
                .flush()
                .map_err(|e| PitempError::display_error(format!("flushing frame: {:?}", e)))
        }

        fn cleanup(&mut self) -> Result<()> {
            if !self.clear_on_exit {
                return Ok(());
            }
            DrawTarget::clear(&mut self.panel, BinaryColor::Off)
                .map_err(|e| PitempError::display_error(format!("clearing display: {:?}", e)))?;
            self.panel
                .flush()
                .map_err(|e| PitempError::display_error(format!("clearing display: {:?}", e)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::Canvas;
    use crate::reading::Reading;
    use chrono::{Local, TimeZone, Utc};
    use std::time::Duration;

    fn now() -> chrono::DateTime<Local> {
        Local.with_ymd_and_hms(2006, 1, 2, 15, 4, 5).unwrap()
    }

    #[test]
    fn test_waiting_lines() {
        let frame = Frame::new(Reading::default(), now(), None, Duration::from_secs(180));
        assert_eq!(oled_lines(&frame), ["waiting for", "sensor data"]);
    }

    #[test]
    fn test_reading_lines() {
        let captured = (now() - chrono::Duration::seconds(10)).with_timezone(&Utc);
        let frame = Frame::new(
            Reading::new(21.4, 40.0, captured),
            now(),
            None,
            Duration::from_secs(180),
        );
        assert_eq!(oled_lines(&frame), ["Temp: 21C", "Humid: 40%"]);
    }

    #[test]
    fn test_stale_marker() {
        let captured = (now() - chrono::Duration::minutes(5)).with_timezone(&Utc);
        let frame = Frame::new(
            Reading::new(21.4, 40.0, captured),
            now(),
            None,
            Duration::from_secs(180),
        );
        assert_eq!(oled_lines(&frame)[0], "Temp: 21C STALE!");
    }

    #[test]
    fn test_draw_frame_layout() {
        let frame = Frame::new(Reading::default(), now(), None, Duration::from_secs(180));
        let mut canvas = Canvas::oled();
        draw_frame(&mut canvas, &frame).unwrap();

        // Text in the top rows, the rule spans the full width above the clock.
        assert!(canvas.row_has_ink(5));
        assert!((0..128).all(|x| canvas.is_on(x, 24)));
        assert!(canvas.row_has_ink(28));
    }

    #[test]
    fn test_draw_frame_clears_previous_content() {
        let mut canvas = Canvas::oled();
        let waiting = Frame::new(Reading::default(), now(), None, Duration::from_secs(180));
        draw_frame(&mut canvas, &waiting).unwrap();
        let first = canvas.clone();

        draw_frame(&mut canvas, &waiting).unwrap();
        assert_eq!(canvas, first);
    }
}
