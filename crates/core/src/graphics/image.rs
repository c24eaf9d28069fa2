//! Rendered image output
//!
//! A plain, owned pixel grid with 1, 3 or 4 channels. This is what the
//! engine hands back after a render pass and what textures decode into.

use super::color::{Color3, Color4};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    width: u32,
    height: u32,
    channels: u8,
    data: Vec<u8>,
}

impl Image {
    /// Create an image filled with zeros
    ///
    /// # Panics
    ///
    /// Panics if `channels` is not 1, 3 or 4.
    pub fn new(width: u32, height: u32, channels: u8) -> Self {
        assert!(
            matches!(channels, 1 | 3 | 4),
            "unsupported channel count {}",
            channels
        );
        Self {
            width,
            height,
            channels,
            data: vec![0; width as usize * height as usize * channels as usize],
        }
    }

    /// Wrap raw interleaved data. Returns `None` if the length does not match.
    pub fn from_raw(width: u32, height: u32, channels: u8, data: Vec<u8>) -> Option<Self> {
        let expected = width as usize * height as usize * channels as usize;
        if matches!(channels, 1 | 3 | 4) && data.len() == expected {
            Some(Self {
                width,
                height,
                channels,
                data,
            })
        } else {
            None
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    pub fn as_raw(&self) -> &[u8] {
        &self.data
    }

    #[inline]
    fn offset(&self, x: u32, y: u32) -> Option<usize> {
        if x < self.width && y < self.height {
            Some((y as usize * self.width as usize + x as usize) * self.channels as usize)
        } else {
            None
        }
    }

    /// Read a pixel. Gray images expand to RGB, missing transparency is 0.
    pub fn pixel_at(&self, x: u32, y: u32) -> Option<Color4> {
        let o = self.offset(x, y)?;
        let d = &self.data;
        Some(match self.channels {
            1 => Color4::opaque(d[o], d[o], d[o]),
            3 => Color4::opaque(d[o], d[o + 1], d[o + 2]),
            _ => Color4::new(d[o], d[o + 1], d[o + 2], d[o + 3]),
        })
    }

    /// Write a pixel. Out-of-bounds writes are ignored.
    pub fn set_pixel_at(&mut self, x: u32, y: u32, color: Color4) {
        let Some(o) = self.offset(x, y) else {
            return;
        };
        match self.channels {
            1 => {
                let gray = (color.r as u16 + color.g as u16 + color.b as u16) / 3;
                self.data[o] = gray as u8;
            }
            3 => self.data[o..o + 3].copy_from_slice(&[color.r, color.g, color.b]),
            _ => self.data[o..o + 4].copy_from_slice(&[color.r, color.g, color.b, color.a]),
        }
    }

    /// Fill every pixel with one color
    pub fn fill(&mut self, color: Color3) {
        for y in 0..self.height {
            for x in 0..self.width {
                self.set_pixel_at(x, y, color.into());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_initialization() {
        let img = Image::new(10, 5, 3);
        assert_eq!(img.as_raw().len(), 150);
        assert_eq!(img.pixel_at(9, 4), Some(Color4::opaque(0, 0, 0)));
        assert_eq!(img.pixel_at(10, 4), None);
    }

    #[test]
    fn test_rgb_drops_transparency() {
        let mut img = Image::new(2, 2, 3);
        img.set_pixel_at(1, 1, Color4::new(10, 20, 30, 40));
        assert_eq!(img.pixel_at(1, 1), Some(Color4::opaque(10, 20, 30)));
    }

    #[test]
    fn test_rgba_keeps_transparency() {
        let mut img = Image::new(2, 2, 4);
        img.set_pixel_at(0, 1, Color4::new(10, 20, 30, 40));
        assert_eq!(img.pixel_at(0, 1), Some(Color4::new(10, 20, 30, 40)));
    }

    #[test]
    fn test_from_raw_length_check() {
        assert!(Image::from_raw(2, 2, 3, vec![0; 12]).is_some());
        assert!(Image::from_raw(2, 2, 3, vec![0; 11]).is_none());
        assert!(Image::from_raw(2, 2, 2, vec![0; 8]).is_none());
    }
}
