//! In-memory monochrome framebuffer.

use crate::error::{PitempError, Result};
use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::*;
use std::convert::Infallible;

/// Width of the PiOLED panel.
pub const OLED_WIDTH: u32 = 128;
/// Height of the PiOLED panel.
pub const OLED_HEIGHT: u32 = 32;

/// A 1-bit framebuffer that `embedded-graphics` can draw on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Canvas {
    size: Size,
    pixels: Vec<bool>,
}

impl Canvas {
    /// Create a blank canvas.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            size: Size::new(width, height),
            pixels: vec![false; (width * height) as usize],
        }
    }

    /// A blank canvas the size of the PiOLED.
    pub fn oled() -> Self {
        Self::new(OLED_WIDTH, OLED_HEIGHT)
    }

    /// Whether the pixel at (`x`, `y`) is lit. Out of bounds is unlit.
    pub fn is_on(&self, x: u32, y: u32) -> bool {
        if x >= self.size.width || y >= self.size.height {
            return false;
        }
        self.pixels[(y * self.size.width + x) as usize]
    }

    /// Number of lit pixels.
    pub fn lit_count(&self) -> usize {
        self.pixels.iter().filter(|on| **on).count()
    }

    /// Whether any pixel in row `y` is lit.
    pub fn row_has_ink(&self, y: u32) -> bool {
        (0..self.size.width).any(|x| self.is_on(x, y))
    }

    /// Encode as a 1-bit grayscale PNG (white ink on black).
    pub fn to_png(&self) -> Result<Vec<u8>> {
        let stride = self.size.width.div_ceil(8) as usize;
        let mut data = vec![0u8; stride * self.size.height as usize];
        for y in 0..self.size.height {
            for x in 0..self.size.width {
                if self.is_on(x, y) {
                    data[y as usize * stride + x as usize / 8] |= 0x80 >> (x % 8);
                }
            }
        }

        let mut out = Vec::new();
        {
            let mut encoder = png::Encoder::new(&mut out, self.size.width, self.size.height);
            encoder.set_color(png::ColorType::Grayscale);
            encoder.set_depth(png::BitDepth::One);
            let mut writer = encoder
                .write_header()
                .map_err(|e| PitempError::encode_error(e.to_string()))?;
            writer
                .write_image_data(&data)
                .map_err(|e| PitempError::encode_error(e.to_string()))?;
            writer
                .finish()
                .map_err(|e| PitempError::encode_error(e.to_string()))?;
        }
        Ok(out)
    }
}

impl OriginDimensions for Canvas {
    fn size(&self) -> Size {
        self.size
    }
}

impl DrawTarget for Canvas {
    type Color = BinaryColor;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> std::result::Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(point, color) in pixels {
            if point.x < 0 || point.y < 0 {
                continue;
            }
            let (x, y) = (point.x as u32, point.y as u32);
            if x < self.size.width && y < self.size.height {
                self.pixels[(y * self.size.width + x) as usize] = color.is_on();
            }
        }
        Ok(())
    }
}
