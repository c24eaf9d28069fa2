//! Buffer duplication for periodic scenes
//!
//! A rendered tile is copied onto itself shifted by a raster offset
//! `(dx, dy, dz)`, going through the normal depth test so that nearer
//! content is never overwritten. Sources are read from a snapshot taken
//! before the shift, so a shift never sees pixels it has just written.

use crate::engine_core::EngineCore;
use pgl_core::camera::ProjectionCamera;
use pgl_core::graphics::{Color3, Color4, DepthBuffer};
use pgl_core::logging::{log, LogCategory, LogLevel};
use std::ops::Range;

/// Below this a depth offset counts as zero
const ZERO_SHIFT: f64 = 1e-5;

/// Destination span of a shift by `diff` over `len` pixels, `None` when the
/// shift moves everything out of the image
fn shifted_range(diff: i64, len: u32, allow_full: bool) -> Option<Range<i64>> {
    let len = len as i64;
    let limit_hit = if allow_full {
        diff.abs() > len
    } else {
        diff.abs() >= len
    };
    if limit_hit {
        return None;
    }
    Some(diff.max(0)..(len + diff.min(0)))
}

impl EngineCore {
    /// Copy the buffers onto themselves shifted by `(dx, dy, dz)`
    ///
    /// When `camera` is given, shifted depths outside its range are dropped.
    /// Colors come from the snapshot unless `use_default_color` is set or
    /// the engine has no frame buffer.
    pub fn duplicate_buffer(
        &self,
        shift: (i32, i32, f64),
        use_default_color: bool,
        default_color: Color3,
        camera: Option<&dyn ProjectionCamera>,
    ) {
        let (dx, dy, dz) = shift;
        if dx == 0 && dy == 0 && dz.abs() < ZERO_SHIFT {
            return;
        }
        let (Some(xs), Some(ys)) = (
            shifted_range(dx as i64, self.width, true),
            shifted_range(dy as i64, self.height, true),
        ) else {
            return;
        };
        self.copy_shifted(xs, ys, shift, use_default_color, default_color, camera);
    }

    /// Duplicate the buffers by `+shift` then by `-shift`
    ///
    /// Each direction reads its own snapshot. Shifts of a whole image
    /// width or height are ignored.
    pub fn periodize_buffer(
        &self,
        shift: (i32, i32, f64),
        use_default_color: bool,
        default_color: Color3,
    ) {
        let (dx, dy, dz) = shift;
        self.periodization_step((dx, dy, dz), use_default_color, default_color);
        self.periodization_step((-dx, -dy, -dz), use_default_color, default_color);
    }

    fn periodization_step(&self, shift: (i32, i32, f64), use_default_color: bool, default_color: Color3) {
        let (dx, dy, dz) = shift;
        if dx == 0 && dy == 0 && dz.abs() < ZERO_SHIFT {
            return;
        }
        let (Some(xs), Some(ys)) = (
            shifted_range(dx as i64, self.width, false),
            shifted_range(dy as i64, self.height, false),
        ) else {
            return;
        };
        self.copy_shifted(xs, ys, shift, use_default_color, default_color, None);
    }

    fn copy_shifted(
        &self,
        xs: Range<i64>,
        ys: Range<i64>,
        shift: (i32, i32, f64),
        use_default_color: bool,
        default_color: Color3,
        camera: Option<&dyn ProjectionCamera>,
    ) {
        let (dx, dy, dz) = (shift.0 as i64, shift.1 as i64, shift.2);
        let depth = self.depth.clone();
        let frame = self.frame.clone();
        let default_color = Color4::from(default_color);

        let mut written = 0usize;
        for y in ys {
            for x in xs.clone() {
                let (sx, sy) = ((x - dx) as u32, (y - dy) as u32);
                let Some(source) = depth.get(sx, sy) else {
                    continue;
                };
                if source == DepthBuffer::FAR {
                    continue;
                }
                let z = source + dz;
                if camera.is_some_and(|c| !c.is_in_z_range(z)) {
                    continue;
                }
                let color = match &frame {
                    Some(frame) if !use_default_color => {
                        frame.pixel_at(sx, sy).unwrap_or(default_color)
                    }
                    _ => default_color,
                };
                if self.render_raster(x as u32, y as u32, z, color) {
                    written += 1;
                }
            }
        }

        log(LogCategory::Buffer, LogLevel::Debug, || {
            format!(
                "Shift ({}, {}, {:.4}) wrote {} pixel(s)",
                shift.0, shift.1, shift.2, written
            )
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shifted_range() {
        assert_eq!(shifted_range(3, 10, true), Some(3..10));
        assert_eq!(shifted_range(-3, 10, true), Some(0..7));
        assert_eq!(shifted_range(10, 10, true), Some(10..10));
        assert_eq!(shifted_range(11, 10, true), None);
        assert_eq!(shifted_range(10, 10, false), None);
        assert_eq!(shifted_range(-9, 10, false), Some(0..1));
    }
}
