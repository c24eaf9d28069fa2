//! Triangle scan conversion
//!
//! Edge-function rasterization in raster space. Vertex depths are inverted
//! before interpolation so that depth and attribute weights are perspective
//! correct:
//!
//! ```text
//! 1/z = w0/z0 + w1/z1 + w2/z2        attribute weight i = wi * z / zi
//! ```
//!
//! Pixels whose lock is busy are not waited on during the scan. They are
//! queued and retried once the scan is done.

use crate::engine_core::EngineCore;
use crate::shader::ShaderSlot;
use glam::{DVec2, DVec3};
use pgl_core::camera::ProjectionCamera;
use pgl_core::logging::{log, LogCategory, LogLevel};
use std::collections::VecDeque;

/// Triangles with a smaller raster area are skipped
const DEGENERATE_AREA: f64 = 1e-12;

/// Failed retries between two `yield_now` while draining
const YIELD_EVERY: u32 = 64;

/// Inclusive pixel rectangle inside the image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x0: i64,
    pub x1: i64,
    pub y0: i64,
    pub y1: i64,
}

impl PixelRect {
    /// Clip `[x0, x1] x [y0, y1]` to a `width x height` image, `None` if empty
    pub fn clipped(x0: i64, x1: i64, y0: i64, y1: i64, width: u32, height: u32) -> Option<Self> {
        let rect = Self {
            x0: x0.max(0),
            x1: x1.min(width as i64 - 1),
            y0: y0.max(0),
            y1: y1.min(height as i64 - 1),
        };
        (rect.x0 <= rect.x1 && rect.y0 <= rect.y1).then_some(rect)
    }

    pub fn area(&self) -> u64 {
        ((self.x1 - self.x0 + 1) * (self.y1 - self.y0 + 1)) as u64
    }
}

/// A covered pixel waiting for its depth test and shading
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fragment {
    pub x: u32,
    pub y: u32,
    pub z: f64,
    /// Perspective-correct barycentric weights
    pub weights: [f64; 3],
}

/// Signed area of `(a, b, c)` times two, sign flipped for clockwise winding
#[inline]
pub fn edge_function(a: DVec3, b: DVec3, c: DVec2, ccw: bool) -> f64 {
    let e = (c.x - a.x) * (b.y - a.y) - (c.y - a.y) * (b.x - a.x);
    if ccw {
        e
    } else {
        -e
    }
}

impl EngineCore {
    /// Depth test and shade under the pixel lock
    ///
    /// Returns `false` only when the lock was busy.
    #[inline]
    fn write_fragment(&self, f: &Fragment, shader: &mut ShaderSlot) -> bool {
        let Some(_guard) = self.try_lock(f.x, f.y) else {
            return false;
        };
        if self.is_visible(f.x, f.y, f.z) {
            self.depth.set(f.x, f.y, f.z);
            if let Some(shader) = shader {
                shader.process(f.x, f.y, f.z, f.weights);
            }
        }
        true
    }
}

/// Scan `rect` for pixels covered by the raster-space triangle `v`
pub(crate) fn rasterize(
    core: &EngineCore,
    rect: PixelRect,
    v: [DVec3; 3],
    ccw: bool,
    shader: &mut ShaderSlot,
    camera: &dyn ProjectionCamera,
) {
    let z = [v[0].z, v[1].z, v[2].z];
    let r = v.map(|p| DVec3::new(p.x, p.y, 1.0 / p.z));

    let area = edge_function(r[0], r[1], r[2].truncate(), ccw);
    if area.abs() < DEGENERATE_AREA {
        log(LogCategory::Raster, LogLevel::Trace, || {
            "Degenerate triangle skipped".to_string()
        });
        return;
    }

    let mut pending = VecDeque::new();
    for y in rect.y0..=rect.y1 {
        for x in rect.x0..=rect.x1 {
            let sample = DVec2::new(x as f64 + 0.5, y as f64 + 0.5);
            let w0 = edge_function(r[1], r[2], sample, ccw);
            let w1 = edge_function(r[2], r[0], sample, ccw);
            let w2 = edge_function(r[0], r[1], sample, ccw);
            let inside = (w0 >= 0.0 && w1 >= 0.0 && w2 >= 0.0)
                || (w0 <= 0.0 && w1 <= 0.0 && w2 <= 0.0);
            if !inside {
                continue;
            }

            let (w0, w1, w2) = (w0 / area, w1 / area, w2 / area);
            let depth = 1.0 / (r[0].z * w0 + r[1].z * w1 + r[2].z * w2);
            if !camera.is_in_z_range(depth) {
                continue;
            }

            let (px, py) = (x as u32, y as u32);
            if !core.is_visible(px, py, depth) {
                continue;
            }
            let fragment = Fragment {
                x: px,
                y: py,
                z: depth,
                weights: [w0 * depth / z[0], w1 * depth / z[1], w2 * depth / z[2]],
            };
            if !core.write_fragment(&fragment, shader) {
                pending.push_back(fragment);
            }
        }
    }

    drain(core, pending, shader);
}

/// Retry queued fragments until each one got its lock
fn drain(core: &EngineCore, mut pending: VecDeque<Fragment>, shader: &mut ShaderSlot) {
    if pending.is_empty() {
        return;
    }
    log(LogCategory::Raster, LogLevel::Trace, || {
        format!("{} fragment(s) deferred on lock contention", pending.len())
    });

    let mut failures: u32 = 0;
    while let Some(fragment) = pending.pop_front() {
        if core.write_fragment(&fragment, shader) {
            continue;
        }
        pending.push_back(fragment);
        failures = failures.wrapping_add(1);
        if failures % YIELD_EVERY == 0 {
            std::thread::yield_now();
        } else {
            std::hint::spin_loop();
        }
    }
}

/// Liang-Barsky clip of the segment `p0 -> p1` against `[0, w] x [0, h]`
///
/// Returns the parameter interval that stays inside.
pub fn clip_segment(p0: DVec2, p1: DVec2, w: f64, h: f64) -> Option<(f64, f64)> {
    let d = p1 - p0;
    let mut t0: f64 = 0.0;
    let mut t1: f64 = 1.0;
    for (p, q) in [(-d.x, p0.x), (d.x, w - p0.x), (-d.y, p0.y), (d.y, h - p0.y)] {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
        } else {
            let t = q / p;
            if p < 0.0 {
                if t > t1 {
                    return None;
                }
                t0 = t0.max(t);
            } else {
                if t < t0 {
                    return None;
                }
                t1 = t1.min(t);
            }
        }
    }
    Some((t0, t1))
}
