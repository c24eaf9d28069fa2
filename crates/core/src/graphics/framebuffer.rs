//! Color buffer shared by rasterizer threads
//!
//! Pixels are packed into `AtomicU32` cells so that concurrent readers and
//! writers never race at the memory level. Compound read-modify-write
//! sequences (alpha blending) still need an external per-pixel lock.

use super::color::{Color4, Color4Format};
use super::image::Image;
use std::sync::atomic::{AtomicU32, Ordering};

const PACKING: Color4Format = Color4Format::Rgba;

pub struct FrameBuffer {
    width: u32,
    height: u32,
    channels: u8,
    pixels: Vec<AtomicU32>,
}

impl FrameBuffer {
    /// Create a buffer filled with `background`
    ///
    /// # Panics
    ///
    /// Panics if `channels` is not 3 or 4.
    pub fn new(width: u32, height: u32, channels: u8, background: Color4) -> Self {
        assert!(
            matches!(channels, 3 | 4),
            "frame buffer needs 3 or 4 channels, got {}",
            channels
        );
        let packed = background.to_uint(PACKING);
        Self {
            width,
            height,
            channels,
            pixels: (0..width as usize * height as usize)
                .map(|_| AtomicU32::new(packed))
                .collect(),
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

    #[inline]
    fn index(&self, x: u32, y: u32) -> Option<usize> {
        if x < self.width && y < self.height {
            Some(y as usize * self.width as usize + x as usize)
        } else {
            None
        }
    }

    #[inline]
    pub fn pixel_at(&self, x: u32, y: u32) -> Option<Color4> {
        self.index(x, y)
            .map(|idx| Color4::from_uint(self.pixels[idx].load(Ordering::Relaxed), PACKING))
    }

    /// Store a pixel verbatim. Out-of-bounds writes are ignored.
    #[inline]
    pub fn set_pixel_at(&self, x: u32, y: u32, color: Color4) {
        if let Some(idx) = self.index(x, y) {
            self.pixels[idx].store(color.to_uint(PACKING), Ordering::Relaxed);
        }
    }

    /// Reset every pixel to `background`
    pub fn fill(&self, background: Color4) {
        let packed = background.to_uint(PACKING);
        for cell in &self.pixels {
            cell.store(packed, Ordering::Relaxed);
        }
    }

    /// Copy the current contents into an owned image with the same channel count
    pub fn to_image(&self) -> Image {
        let mut image = Image::new(self.width, self.height, self.channels);
        for y in 0..self.height {
            for x in 0..self.width {
                if let Some(c) = self.pixel_at(x, y) {
                    image.set_pixel_at(x, y, c);
                }
            }
        }
        image
    }

    /// Iterate over every stored pixel in row-major order
    pub fn pixels(&self) -> impl Iterator<Item = Color4> + '_ {
        self.pixels
            .iter()
            .map(|cell| Color4::from_uint(cell.load(Ordering::Relaxed), PACKING))
    }
}

impl Clone for FrameBuffer {
    /// Deep copy of the current contents
    fn clone(&self) -> Self {
        Self {
            width: self.width,
            height: self.height,
            channels: self.channels,
            pixels: self
                .pixels
                .iter()
                .map(|cell| AtomicU32::new(cell.load(Ordering::Relaxed)))
                .collect(),
        }
    }
}

impl std::fmt::Debug for FrameBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameBuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("channels", &self.channels)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphics::Color3;

    #[test]
    fn test_background_fill() {
        let fb = FrameBuffer::new(8, 4, 3, Color3::new(1, 2, 3).into());
        assert!(fb.pixels().all(|c| c == Color4::opaque(1, 2, 3)));
        assert_eq!(fb.pixels().count(), 32);
    }

    #[test]
    fn test_set_and_get() {
        let fb = FrameBuffer::new(8, 4, 4, Color4::BLACK);
        fb.set_pixel_at(7, 3, Color4::new(9, 8, 7, 6));
        assert_eq!(fb.pixel_at(7, 3), Some(Color4::new(9, 8, 7, 6)));
        assert_eq!(fb.pixel_at(8, 3), None);
    }

    #[test]
    fn test_to_image_respects_channels() {
        let fb = FrameBuffer::new(2, 2, 3, Color4::BLACK);
        fb.set_pixel_at(1, 0, Color4::new(9, 8, 7, 6));
        let img = fb.to_image();
        assert_eq!(img.channels(), 3);
        assert_eq!(img.pixel_at(1, 0), Some(Color4::opaque(9, 8, 7)));
    }

    #[test]
    fn test_clone_is_a_snapshot() {
        let fb = FrameBuffer::new(2, 2, 3, Color4::BLACK);
        let snapshot = fb.clone();
        fb.set_pixel_at(0, 0, Color4::WHITE);
        assert_eq!(snapshot.pixel_at(0, 0), Some(Color4::BLACK));
    }
}
