//! Render target shared by the engine, its shaders and its tasks
//!
//! [`EngineCore`] owns the depth and frame buffers plus everything a worker
//! thread needs to write into them. It lives behind an `Arc` so that tasks
//! and shader copies can outlive the call that spawned them.

use crate::config::RenderConfig;
use crate::image_mutex::{ImageMutex, PixelGuard};
use crate::rasterizer::{self, PixelRect};
use crate::shader::{Light, ShaderSlot};
use crate::task_manager::TaskManager;
use crate::texture_cache::TextureCache;
use glam::{DVec2, DVec3};
use pgl_core::camera::ProjectionCamera;
use pgl_core::graphics::{Color4, Color4Format, DepthBuffer, FrameBuffer};
use pgl_core::logging::{log, LogCategory, LogLevel};
use std::sync::{Arc, PoisonError, RwLock};

/// Transparency under which a color simply replaces the pixel
const OPAQUE_EPSILON: f64 = 1e-5;

pub struct EngineCore {
    pub(crate) width: u32,
    pub(crate) height: u32,
    pub(crate) depth: DepthBuffer,
    pub(crate) frame: Option<FrameBuffer>,
    pub(crate) background: Color4,
    /// Set when the frame buffer stores packed ids instead of colors
    pub(crate) id_format: Option<Color4Format>,
    pub(crate) image_mutex: Option<Arc<ImageMutex>>,
    pub(crate) config: RenderConfig,
    pub(crate) tasks: Arc<TaskManager>,
    light: RwLock<Light>,
    textures: TextureCache,
}

impl EngineCore {
    pub(crate) fn new(
        width: u32,
        height: u32,
        frame: Option<FrameBuffer>,
        background: Color4,
        id_format: Option<Color4Format>,
        config: RenderConfig,
        tasks: Arc<TaskManager>,
    ) -> Self {
        let image_mutex = config
            .multithreaded
            .then(|| tasks.image_mutex(width, height, config.mutex_tile_size));
        Self {
            width,
            height,
            depth: DepthBuffer::new(width, height),
            frame,
            background,
            id_format,
            image_mutex,
            config,
            tasks,
            light: RwLock::new(Light::default()),
            textures: TextureCache::new(),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    pub fn tasks(&self) -> &Arc<TaskManager> {
        &self.tasks
    }

    pub fn is_multithreaded(&self) -> bool {
        self.config.multithreaded
    }

    pub fn depth_buffer(&self) -> &DepthBuffer {
        &self.depth
    }

    pub fn frame_buffer(&self) -> Option<&FrameBuffer> {
        self.frame.as_ref()
    }

    pub fn textures(&self) -> &TextureCache {
        &self.textures
    }

    pub fn light(&self) -> Light {
        *self.light.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_light(&self, light: Light) {
        *self.light.write().unwrap_or_else(PoisonError::into_inner) = light;
    }

    /// Transparency at or above the threshold means "do not draw"
    #[inline]
    pub fn is_totally_transparent(&self, alpha: f64) -> bool {
        alpha >= self.config.alpha_threshold
    }

    #[inline]
    pub fn is_visible(&self, x: u32, y: u32, z: f64) -> bool {
        self.depth.is_visible(x, y, z, self.config.depth_epsilon)
    }

    /// Lock the pixel, a no-op when single-threaded
    #[inline]
    pub fn lock(&self, x: u32, y: u32) -> PixelGuard<'_> {
        match &self.image_mutex {
            Some(mutex) => mutex.lock(x, y),
            None => PixelGuard::unlocked(),
        }
    }

    /// Non-blocking [`EngineCore::lock`]. Always succeeds when single-threaded.
    #[inline]
    pub fn try_lock(&self, x: u32, y: u32) -> Option<PixelGuard<'_>> {
        match &self.image_mutex {
            Some(mutex) => mutex.try_lock(x, y),
            None => Some(PixelGuard::unlocked()),
        }
    }

    pub fn frame_buffer_at(&self, x: u32, y: u32) -> Option<Color4> {
        self.frame.as_ref()?.pixel_at(x, y)
    }

    /// Write a color with the transparency policy
    ///
    /// Near-zero transparency overwrites, transparency at the threshold is
    /// dropped, anything between blends `dest * (1 - a) + src * a`. Id
    /// buffers are written verbatim. Callers hold the pixel lock.
    pub fn set_frame_buffer_at(&self, x: u32, y: u32, color: Color4) {
        let Some(frame) = &self.frame else {
            return;
        };
        if self.id_format.is_some() {
            frame.set_pixel_at(x, y, color);
            return;
        }

        let alpha = color.alpha();
        if alpha < OPAQUE_EPSILON {
            frame.set_pixel_at(x, y, color.rgb().into());
        } else if !self.is_totally_transparent(alpha) {
            if let Some(current) = frame.pixel_at(x, y) {
                let blended = current.rgb().blend(color.rgb(), color.alpha_clamped());
                frame.set_pixel_at(x, y, blended.into());
            }
        }
    }

    /// Store a color without blending. Callers hold the pixel lock.
    pub fn write_raw(&self, x: u32, y: u32, color: Color4) {
        if let Some(frame) = &self.frame {
            frame.set_pixel_at(x, y, color);
        }
    }

    /// Depth-tested pixel write
    ///
    /// The depth test is repeated under the pixel lock. Returns whether the
    /// pixel was written.
    pub fn render_raster(&self, x: u32, y: u32, z: f64, color: Color4) -> bool {
        if self.id_format.is_none() && self.is_totally_transparent(color.alpha()) {
            return false;
        }

        let _guard = self.lock(x, y);
        if self.is_visible(x, y, z) {
            self.depth.set(x, y, z);
            self.set_frame_buffer_at(x, y, color);
            true
        } else {
            false
        }
    }

    /// Square of side `width` centered on pixel `(cx, cy)`, clipped to the image
    fn splat(&self, cx: i64, cy: i64, z: f64, color: Color4, width: u32) {
        let half = (width / 2) as i64;
        let rect = PixelRect::clipped(
            cx - half,
            cx + half,
            cy - half,
            cy + half,
            self.width,
            self.height,
        );
        if let Some(rect) = rect {
            for y in rect.y0..=rect.y1 {
                for x in rect.x0..=rect.x1 {
                    self.render_raster(x as u32, y as u32, z, color);
                }
            }
        }
    }

    pub fn render_point(&self, v: DVec3, color: Color4, width: u32, camera: &dyn ProjectionCamera) {
        let r = camera.world_to_raster(v, self.width, self.height);
        let on_screen = r.x >= 0.0
            && r.x < self.width as f64
            && r.y >= 0.0
            && r.y < self.height as f64;
        if !on_screen || !camera.is_in_z_range(r.z) {
            return;
        }
        self.splat(r.x as i64, r.y as i64, r.z, color, width);
    }

    /// Line segment with perspective-correct depth and color
    pub fn render_segment(
        &self,
        v: [DVec3; 2],
        colors: [Color4; 2],
        width: u32,
        camera: &dyn ProjectionCamera,
    ) {
        let r0 = camera.world_to_raster(v[0], self.width, self.height);
        let r1 = camera.world_to_raster(v[1], self.width, self.height);
        if !r0.is_finite() || !r1.is_finite() || !camera.overlaps_z_range(r0.z.min(r1.z), r0.z.max(r1.z))
        {
            return;
        }

        let Some((t0, t1)) = rasterizer::clip_segment(
            r0.truncate(),
            r1.truncate(),
            self.width as f64,
            self.height as f64,
        ) else {
            return;
        };

        let span: DVec2 = (r1 - r0).truncate() * (t1 - t0);
        let steps = span.x.abs().max(span.y.abs()).ceil().max(1.0) as usize;
        for i in 0..=steps {
            let t = t0 + (t1 - t0) * i as f64 / steps as f64;
            let z = 1.0 / ((1.0 - t) / r0.z + t / r1.z);
            if !camera.is_in_z_range(z) {
                continue;
            }
            let weight = t * z / r1.z;
            let p = r0.lerp(r1, t);
            let color = colors[0].lerp(colors[1], weight);
            self.splat(p.x.floor() as i64, p.y.floor() as i64, z, color, width);
        }
    }

    /// Project, cull and rasterize one triangle
    ///
    /// Triangles off screen, with a non-finite projection or outside the
    /// camera depth range are dropped silently. Large ones become tasks that
    /// own a copy of the shader and the camera.
    pub fn render_shaded_triangle(
        self: &Arc<Self>,
        v: [DVec3; 3],
        ccw: bool,
        shader: &mut ShaderSlot,
        camera: &Arc<dyn ProjectionCamera>,
    ) {
        let r = v.map(|p| camera.world_to_raster(p, self.width, self.height));
        if r.iter().any(|p| !p.is_finite()) {
            log(LogCategory::Raster, LogLevel::Trace, || {
                "Triangle with a non-finite projection culled".to_string()
            });
            return;
        }

        let lo = r[0].min(r[1]).min(r[2]);
        let hi = r[0].max(r[1]).max(r[2]);
        if lo.x >= self.width as f64
            || hi.x < 0.0
            || lo.y >= self.height as f64
            || hi.y < 0.0
            || !camera.overlaps_z_range(lo.z, hi.z)
        {
            return;
        }

        let Some(rect) = PixelRect::clipped(
            lo.x.floor() as i64,
            hi.x.floor() as i64,
            lo.y.floor() as i64,
            hi.y.floor() as i64,
            self.width,
            self.height,
        ) else {
            return;
        };

        if self.is_multithreaded() && rect.area() > self.config.parallel_pixel_area {
            let mut task_shader = shader.as_ref().map(|s| s.copy(false));
            let task_camera = camera.copy();
            let core = Arc::clone(self);
            self.tasks.new_task(move || {
                if let Some(s) = task_shader.as_mut() {
                    s.init_env(&task_camera);
                }
                rasterizer::rasterize(&core, rect, r, ccw, &mut task_shader, task_camera.as_ref());
            });
        } else {
            rasterizer::rasterize(self, rect, r, ccw, shader, camera.as_ref());
        }
    }

    /// Reset depth to the far plane and colors to the background
    pub fn clear(&self) {
        self.depth.clear();
        if let Some(frame) = &self.frame {
            frame.fill(self.background);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pgl_core::graphics::Color3;

    fn core(multithreaded: bool, id_format: Option<Color4Format>) -> Arc<EngineCore> {
        let config = RenderConfig {
            multithreaded,
            ..RenderConfig::default()
        };
        let channels = if id_format.is_some() { 4 } else { 3 };
        Arc::new(EngineCore::new(
            16,
            16,
            Some(FrameBuffer::new(16, 16, channels, Color4::BLACK)),
            Color4::BLACK,
            id_format,
            config,
            Arc::new(TaskManager::inline()),
        ))
    }

    #[test]
    fn test_render_raster_depth_rules() {
        let core = core(false, None);
        assert!(core.render_raster(3, 3, 5.0, Color4::opaque(255, 0, 0)));
        // Tie within epsilon keeps the existing pixel
        assert!(!core.render_raster(3, 3, 5.0 - 1e-7, Color4::opaque(0, 255, 0)));
        assert!(!core.render_raster(3, 3, 6.0, Color4::opaque(0, 255, 0)));
        assert!(core.render_raster(3, 3, 4.0, Color4::opaque(0, 0, 255)));
        assert_eq!(core.frame_buffer_at(3, 3), Some(Color4::opaque(0, 0, 255)));
        assert_eq!(core.depth_buffer().get(3, 3), Some(4.0));
        // Off image
        assert!(!core.render_raster(16, 3, 1.0, Color4::WHITE));
    }

    #[test]
    fn test_transparent_colors_are_skipped() {
        let core = core(false, None);
        let invisible = Color3::WHITE.with_transparency(255);
        assert!(!core.render_raster(1, 1, 1.0, invisible));
        assert_eq!(core.depth_buffer().get(1, 1), Some(DepthBuffer::FAR));
    }

    #[test]
    fn test_id_buffer_ignores_transparency() {
        let core = core(false, Some(Color4Format::Argb));
        let id = Color4::from_uint(0xff00_0001, Color4Format::Argb);
        assert!(core.render_raster(2, 2, 1.0, id));
        assert_eq!(core.frame_buffer_at(2, 2), Some(id));
    }

    #[test]
    fn test_lock_is_noop_single_threaded() {
        let core = core(false, None);
        let first = core.lock(0, 0);
        assert!(!first.is_held());
        assert!(core.try_lock(0, 0).is_some());
    }

    #[test]
    fn test_try_lock_contention_multithreaded() {
        let core = core(true, None);
        let held = core.lock(0, 0);
        assert!(held.is_held());
        assert!(core.try_lock(1, 1).is_none());
        drop(held);
        assert!(core.try_lock(1, 1).is_some());
    }

    #[test]
    fn test_clear_restores_background() {
        let core = core(false, None);
        core.render_raster(0, 0, 1.0, Color4::WHITE);
        core.clear();
        assert_eq!(core.frame_buffer_at(0, 0), Some(Color4::BLACK));
        assert_eq!(core.depth_buffer().covered_pixels(), 0);
    }

    #[test]
    fn test_light_roundtrip() {
        let core = core(false, None);
        let light = Light {
            position: DVec3::X,
            ..Light::default()
        };
        core.set_light(light);
        assert_eq!(core.light().position, DVec3::X);
    }
}
