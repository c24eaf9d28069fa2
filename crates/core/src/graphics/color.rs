//! Color types used by the frame buffer and the shaders
//!
//! Channels are 8-bit. `Color4` carries a fourth channel that follows the
//! scene-graph convention: it is a *transparency*, not an opacity. `0`
//! means fully opaque and `255` fully transparent.

use serde::{Deserialize, Serialize};

/// Opaque RGB color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Color3 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

/// RGB color plus a transparency channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Color4 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    /// Transparency (0 = opaque, 255 = invisible)
    pub a: u8,
}

/// Channel order used when packing a `Color4` into a `u32`
///
/// The first letter names the most significant byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Color4Format {
    #[default]
    Argb,
    Rgba,
    Bgra,
    Abgr,
}

#[inline]
fn channel(value: f64) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

impl Color3 {
    pub const BLACK: Color3 = Color3::new(0, 0, 0);
    pub const WHITE: Color3 = Color3::new(255, 255, 255);
    pub const RED: Color3 = Color3::new(255, 0, 0);
    pub const GREEN: Color3 = Color3::new(0, 255, 0);
    pub const BLUE: Color3 = Color3::new(0, 0, 255);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Scale every channel by `factor`, clamping to [0, 255]
    ///
    /// ```
    /// use pgl_core::graphics::Color3;
    ///
    /// let darker = Color3::new(200, 100, 50).scale(0.5);
    /// assert_eq!(darker, Color3::new(100, 50, 25));
    /// ```
    #[inline]
    pub fn scale(self, factor: f64) -> Self {
        Self::new(
            channel(self.r as f64 * factor),
            channel(self.g as f64 * factor),
            channel(self.b as f64 * factor),
        )
    }

    /// Channel-wise product, each channel normalized to [0, 1] first
    #[inline]
    pub fn modulate(self, other: Color3) -> Self {
        Self::new(
            channel(self.r as f64 * other.r as f64 / 255.0),
            channel(self.g as f64 * other.g as f64 / 255.0),
            channel(self.b as f64 * other.b as f64 / 255.0),
        )
    }

    /// Saturating channel-wise sum
    #[inline]
    pub fn saturating_add(self, other: Color3) -> Self {
        Self::new(
            self.r.saturating_add(other.r),
            self.g.saturating_add(other.g),
            self.b.saturating_add(other.b),
        )
    }

    /// Linear interpolation (`t = 0` gives `self`, `t = 1` gives `other`)
    #[inline]
    pub fn lerp(self, other: Color3, t: f64) -> Self {
        let mix = |a: u8, b: u8| channel(a as f64 + (b as f64 - a as f64) * t);
        Self::new(mix(self.r, other.r), mix(self.g, other.g), mix(self.b, other.b))
    }

    /// Blend `src` over `self`: `self * (1 - alpha) + src * alpha`
    #[inline]
    pub fn blend(self, src: Color3, alpha: f64) -> Self {
        let mix = |d: u8, s: u8| channel(d as f64 * (1.0 - alpha) + s as f64 * alpha);
        Self::new(mix(self.r, src.r), mix(self.g, src.g), mix(self.b, src.b))
    }

    pub fn with_transparency(self, a: u8) -> Color4 {
        Color4::new(self.r, self.g, self.b, a)
    }
}

impl Color4 {
    pub const BLACK: Color4 = Color4::new(0, 0, 0, 0);
    pub const WHITE: Color4 = Color4::new(255, 255, 255, 0);

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Opaque color from RGB channels
    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self::new(r, g, b, 0)
    }

    /// Build from a color and a transparency in [0, 1]
    pub fn from_transparency(color: Color3, transparency: f64) -> Self {
        color.with_transparency(channel(transparency * 255.0))
    }

    /// Transparency as a real value in [0, 1]
    #[inline]
    pub fn alpha(&self) -> f64 {
        self.a as f64 / 255.0
    }

    /// Same as [`Color4::alpha`], clamped to [0, 1]
    #[inline]
    pub fn alpha_clamped(&self) -> f64 {
        self.alpha().clamp(0.0, 1.0)
    }

    #[inline]
    pub fn rgb(&self) -> Color3 {
        Color3::new(self.r, self.g, self.b)
    }

    /// Linear interpolation of all four channels
    #[inline]
    pub fn lerp(self, other: Color4, t: f64) -> Self {
        let mix = |a: u8, b: u8| channel(a as f64 + (b as f64 - a as f64) * t);
        Self::new(
            mix(self.r, other.r),
            mix(self.g, other.g),
            mix(self.b, other.b),
            mix(self.a, other.a),
        )
    }

    /// Barycentric combination of three colors
    #[inline]
    pub fn barycentric(c: [Color4; 3], w: [f64; 3]) -> Self {
        let mix = |f: fn(&Color4) -> u8| {
            channel(f(&c[0]) as f64 * w[0] + f(&c[1]) as f64 * w[1] + f(&c[2]) as f64 * w[2])
        };
        Self::new(mix(|c| c.r), mix(|c| c.g), mix(|c| c.b), mix(|c| c.a))
    }

    /// Pack into a `u32` using the given channel order
    ///
    /// ```
    /// use pgl_core::graphics::{Color4, Color4Format};
    ///
    /// let c = Color4::new(0x11, 0x22, 0x33, 0x44);
    /// assert_eq!(c.to_uint(Color4Format::Argb), 0x44112233);
    /// assert_eq!(c.to_uint(Color4Format::Rgba), 0x11223344);
    /// ```
    pub fn to_uint(&self, format: Color4Format) -> u32 {
        let (r, g, b, a) = (self.r as u32, self.g as u32, self.b as u32, self.a as u32);
        match format {
            Color4Format::Argb => (a << 24) | (r << 16) | (g << 8) | b,
            Color4Format::Rgba => (r << 24) | (g << 16) | (b << 8) | a,
            Color4Format::Bgra => (b << 24) | (g << 16) | (r << 8) | a,
            Color4Format::Abgr => (a << 24) | (b << 16) | (g << 8) | r,
        }
    }

    /// Inverse of [`Color4::to_uint`]
    pub fn from_uint(value: u32, format: Color4Format) -> Self {
        let bytes = value.to_be_bytes();
        match format {
            Color4Format::Argb => Self::new(bytes[1], bytes[2], bytes[3], bytes[0]),
            Color4Format::Rgba => Self::new(bytes[0], bytes[1], bytes[2], bytes[3]),
            Color4Format::Bgra => Self::new(bytes[2], bytes[1], bytes[0], bytes[3]),
            Color4Format::Abgr => Self::new(bytes[3], bytes[2], bytes[1], bytes[0]),
        }
    }
}

impl From<Color3> for Color4 {
    fn from(c: Color3) -> Self {
        c.with_transparency(0)
    }
}

impl From<Color4> for Color3 {
    fn from(c: Color4) -> Self {
        c.rgb()
    }
}
