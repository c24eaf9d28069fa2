//! Depth buffer for hidden surface removal
//!
//! Stores one `f64` depth per pixel, initialized to [`DepthBuffer::FAR`].
//! Values live in atomics so that several rasterizer threads can read the
//! buffer while others write it. Atomicity of a *test then write* sequence
//! is not provided here: callers serialize writers per pixel with their own
//! lock and use the relaxed accessors underneath it.
//!
//! # Usage
//!
//! ```
//! use pgl_core::graphics::DepthBuffer;
//!
//! let depth = DepthBuffer::new(320, 240);
//! if depth.is_visible(100, 100, 4.0, 1e-5) {
//!     depth.set(100, 100, 4.0);
//! }
//! assert_eq!(depth.get(100, 100), Some(4.0));
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

/// Per-pixel depth storage
pub struct DepthBuffer {
    width: u32,
    height: u32,
    /// `f64` bit patterns, row-major: index = y * width + x
    buffer: Vec<AtomicU64>,
}

impl DepthBuffer {
    /// Depth of a pixel that nothing has been drawn on
    pub const FAR: f64 = f64::MAX;

    pub fn new(width: u32, height: u32) -> Self {
        let size = width as usize * height as usize;
        Self {
            width,
            height,
            buffer: (0..size).map(|_| AtomicU64::new(Self::FAR.to_bits())).collect(),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    fn index(&self, x: u32, y: u32) -> Option<usize> {
        if x < self.width && y < self.height {
            Some(y as usize * self.width as usize + x as usize)
        } else {
            None
        }
    }

    /// Read a depth value, `None` when out of bounds
    #[inline]
    pub fn get(&self, x: u32, y: u32) -> Option<f64> {
        self.index(x, y)
            .map(|idx| f64::from_bits(self.buffer[idx].load(Ordering::Relaxed)))
    }

    /// Write a depth value. Out-of-bounds writes are ignored.
    #[inline]
    pub fn set(&self, x: u32, y: u32, depth: f64) {
        if let Some(idx) = self.index(x, y) {
            self.buffer[idx].store(depth.to_bits(), Ordering::Relaxed);
        }
    }

    /// Depth test
    ///
    /// A candidate is visible only if it is closer than the stored depth
    /// by more than `epsilon`. Ties are kept so that coplanar surfaces do
    /// not flicker. Out-of-bounds pixels are never visible.
    #[inline]
    pub fn is_visible(&self, x: u32, y: u32, depth: f64, epsilon: f64) -> bool {
        match self.get(x, y) {
            Some(current) => depth < current && (current - depth) > epsilon,
            None => false,
        }
    }

    /// Reset every pixel to the far plane
    pub fn clear(&self) {
        for cell in &self.buffer {
            cell.store(Self::FAR.to_bits(), Ordering::Relaxed);
        }
    }

    /// Number of pixels that hold a drawn depth
    pub fn covered_pixels(&self) -> usize {
        self.buffer
            .iter()
            .filter(|cell| f64::from_bits(cell.load(Ordering::Relaxed)) != Self::FAR)
            .count()
    }

    /// Closest and farthest drawn depths, `None` on an empty buffer
    pub fn depth_range(&self) -> Option<(f64, f64)> {
        self.buffer
            .iter()
            .map(|cell| f64::from_bits(cell.load(Ordering::Relaxed)))
            .filter(|&d| d != Self::FAR)
            .fold(None, |acc, d| match acc {
                None => Some((d, d)),
                Some((lo, hi)) => Some((lo.min(d), hi.max(d))),
            })
    }
}

impl Clone for DepthBuffer {
    /// Deep copy of the current contents
    fn clone(&self) -> Self {
        Self {
            width: self.width,
            height: self.height,
            buffer: self
                .buffer
                .iter()
                .map(|cell| AtomicU64::new(cell.load(Ordering::Relaxed)))
                .collect(),
        }
    }
}

impl std::fmt::Debug for DepthBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DepthBuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}
