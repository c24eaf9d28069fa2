//! Z-buffer projection engine
//!
//! [`ZBufferEngine`] is the public entry point of the crate. It owns an
//! [`EngineCore`] (buffers, locks, task manager handle), a default camera
//! and the triangle shader installed for its rendering style.
//!
//! ```text
//! DepthOnly   depth buffer only, no shader
//! ColorBased  depth + RGB frame buffer, material/texture/lit selector
//! IdBased     depth + RGBA frame buffer holding packed shape ids
//! ```

use crate::config::RenderConfig;
use crate::engine_core::EngineCore;
use crate::error::RenderError;
use crate::shader::{ColorBasedShader, IdBasedShader, Light, ShaderSlot, TriangleShaderSelector};
use crate::task_manager::TaskManager;
use glam::DVec3;
use pgl_core::camera::ProjectionCamera;
use pgl_core::graphics::{Color3, Color4, Color4Format, DepthBuffer, FrameBuffer, Image};
use pgl_core::logging::{log, LogCategory, LogLevel};
use pgl_core::renderer::ProjectionEngine;
use pgl_core::scene::Scene;
use std::collections::BTreeMap;
use std::sync::Arc;

/// What the engine writes besides depth
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderingStyle {
    DepthOnly,
    ColorBased,
    IdBased,
}

/// Raster offset between two world points, rounded to whole pixels
type RasterShift = (i32, i32, f64);

pub struct ZBufferEngine {
    core: Arc<EngineCore>,
    triangle_shader: ShaderSlot,
    camera: Option<Arc<dyn ProjectionCamera>>,
    style: RenderingStyle,
}

impl ZBufferEngine {
    /// Engine on the shared task manager with the default configuration
    pub fn new(width: u32, height: u32, background: Color3, style: RenderingStyle) -> Self {
        Self::with_config(
            width,
            height,
            background.into(),
            style,
            RenderConfig::default(),
            TaskManager::shared(),
        )
    }

    pub fn with_config(
        width: u32,
        height: u32,
        background: Color4,
        style: RenderingStyle,
        config: RenderConfig,
        tasks: Arc<TaskManager>,
    ) -> Self {
        let (frame, id_format) = match style {
            RenderingStyle::DepthOnly => (None, None),
            RenderingStyle::ColorBased => (Some(FrameBuffer::new(width, height, 3, background)), None),
            RenderingStyle::IdBased => (
                Some(FrameBuffer::new(width, height, 4, background)),
                Some(Color4Format::Argb),
            ),
        };
        Self::build(width, height, frame, background, id_format, style, config, tasks)
    }

    /// Id buffer engine: every pixel starts as `default_id`
    pub fn with_id(width: u32, height: u32, default_id: u32, format: Color4Format) -> Self {
        Self::with_id_config(
            width,
            height,
            default_id,
            format,
            RenderConfig::default(),
            TaskManager::shared(),
        )
    }

    pub fn with_id_config(
        width: u32,
        height: u32,
        default_id: u32,
        format: Color4Format,
        config: RenderConfig,
        tasks: Arc<TaskManager>,
    ) -> Self {
        let background = Color4::from_uint(default_id, format);
        let frame = Some(FrameBuffer::new(width, height, 4, background));
        let mut engine = Self::build(
            width,
            height,
            frame,
            background,
            Some(format),
            RenderingStyle::IdBased,
            config,
            tasks,
        );
        engine.triangle_shader = Some(Box::new(IdBasedShader::new(
            Arc::clone(&engine.core),
            default_id,
            format,
        )));
        engine
    }

    #[allow(clippy::too_many_arguments)]
    fn build(
        width: u32,
        height: u32,
        frame: Option<FrameBuffer>,
        background: Color4,
        id_format: Option<Color4Format>,
        style: RenderingStyle,
        config: RenderConfig,
        tasks: Arc<TaskManager>,
    ) -> Self {
        let core = Arc::new(EngineCore::new(
            width, height, frame, background, id_format, config, tasks,
        ));
        let triangle_shader: ShaderSlot = match style {
            RenderingStyle::DepthOnly => None,
            RenderingStyle::ColorBased => Some(Box::new(TriangleShaderSelector::new(Arc::clone(&core)))),
            RenderingStyle::IdBased => Some(Box::new(IdBasedShader::new(
                Arc::clone(&core),
                background.to_uint(Color4Format::Argb),
                Color4Format::Argb,
            ))),
        };
        log(LogCategory::Buffer, LogLevel::Debug, || {
            format!("{:?} engine {}x{} created", style, width, height)
        });
        Self {
            core,
            triangle_shader,
            camera: None,
            style,
        }
    }

    pub fn core(&self) -> &Arc<EngineCore> {
        &self.core
    }

    pub fn style(&self) -> RenderingStyle {
        self.style
    }

    pub fn width(&self) -> u32 {
        self.core.width()
    }

    pub fn height(&self) -> u32 {
        self.core.height()
    }

    pub fn camera(&self) -> Option<&Arc<dyn ProjectionCamera>> {
        self.camera.as_ref()
    }

    /// Replace the shader used by [`ProjectionEngine::process`]
    pub fn set_triangle_shader(&mut self, shader: ShaderSlot) {
        self.triangle_shader = shader;
    }

    /// Directional light with the same color for every component
    pub fn set_light(&self, position: DVec3, color: Color3) {
        self.set_light_components(position, color, color, color);
    }

    pub fn set_light_components(
        &self,
        position: DVec3,
        ambient: Color3,
        diffuse: Color3,
        specular: Color3,
    ) {
        self.core.set_light(Light {
            position,
            ambient,
            diffuse,
            specular,
        });
    }

    fn resolve_camera(
        &self,
        camera: Option<&Arc<dyn ProjectionCamera>>,
    ) -> Result<Arc<dyn ProjectionCamera>, RenderError> {
        camera
            .or(self.camera.as_ref())
            .cloned()
            .ok_or(RenderError::NoCamera)
    }

    /// Triangle with one color per vertex
    pub fn render_triangle(
        &self,
        v: [DVec3; 3],
        colors: [Color4; 3],
        ccw: bool,
        camera: Option<&Arc<dyn ProjectionCamera>>,
    ) -> Result<(), RenderError> {
        let mut shader: ShaderSlot = Some(Box::new(ColorBasedShader::with_colors(
            Arc::clone(&self.core),
            colors,
        )));
        self.render_shaded_triangle(v, ccw, &mut shader, camera)
    }

    /// Triangle shaded by `shader`, which must already be bound to it
    pub fn render_shaded_triangle(
        &self,
        v: [DVec3; 3],
        ccw: bool,
        shader: &mut ShaderSlot,
        camera: Option<&Arc<dyn ProjectionCamera>>,
    ) -> Result<(), RenderError> {
        let camera = self.resolve_camera(camera)?;
        self.core.render_shaded_triangle(v, ccw, shader, &camera);
        Ok(())
    }

    pub fn render_point(
        &self,
        v: DVec3,
        color: Color4,
        width: u32,
        camera: Option<&Arc<dyn ProjectionCamera>>,
    ) -> Result<(), RenderError> {
        let camera = self.resolve_camera(camera)?;
        self.core.render_point(v, color, width, camera.as_ref());
        Ok(())
    }

    pub fn render_segment(
        &self,
        v: [DVec3; 2],
        colors: [Color4; 2],
        width: u32,
        camera: Option<&Arc<dyn ProjectionCamera>>,
    ) -> Result<(), RenderError> {
        let camera = self.resolve_camera(camera)?;
        self.core.render_segment(v, colors, width, camera.as_ref());
        Ok(())
    }

    /// Depth-tested pixel write, see [`EngineCore::render_raster`]
    pub fn render_raster(&self, x: u32, y: u32, z: f64, color: Color4) -> bool {
        self.core.render_raster(x, y, z, color)
    }

    pub fn is_visible(&self, x: u32, y: u32, z: f64) -> bool {
        self.core.is_visible(x, y, z)
    }

    /// Whether a world point would pass the depth test under the default camera
    pub fn is_visible_world(&self, point: DVec3) -> Result<bool, RenderError> {
        let camera = self.resolve_camera(None)?;
        let r = camera.world_to_raster(point, self.width(), self.height());
        if !r.is_finite() || r.x < 0.0 || r.y < 0.0 {
            return Ok(false);
        }
        Ok(self.core.is_visible(r.x as u32, r.y as u32, r.z))
    }

    /// Copy the rendered buffers shifted by a raster offset
    ///
    /// Shifted depths outside the default camera range are dropped when a
    /// camera is set.
    pub fn duplicate_buffer(
        &self,
        dx: i32,
        dy: i32,
        dz: f64,
        use_default_color: bool,
        default_color: Color3,
    ) {
        self.core.duplicate_buffer(
            (dx, dy, dz),
            use_default_color,
            default_color,
            self.camera.as_deref(),
        );
    }

    /// Duplicate the buffers by the offset in both directions
    pub fn periodize_buffer(
        &self,
        dx: i32,
        dy: i32,
        dz: f64,
        use_default_color: bool,
        default_color: Color3,
    ) {
        self.core
            .periodize_buffer((dx, dy, dz), use_default_color, default_color);
    }

    fn raster_shift(&self, from: DVec3, to: DVec3) -> Result<Option<RasterShift>, RenderError> {
        let camera = self.resolve_camera(None)?;
        let r0 = camera.world_to_raster(from, self.width(), self.height());
        let r1 = camera.world_to_raster(to, self.width(), self.height());
        let diff = r1 - r0;
        if !diff.is_finite() {
            log(LogCategory::Buffer, LogLevel::Warn, || {
                format!("World offset {} -> {} does not project, buffer left as is", from, to)
            });
            return Ok(None);
        }
        Ok(Some((diff.x.round() as i32, diff.y.round() as i32, diff.z)))
    }

    /// [`ZBufferEngine::duplicate_buffer`] by the raster offset of `from -> to`
    pub fn duplicate_buffer_world(
        &self,
        from: DVec3,
        to: DVec3,
        use_default_color: bool,
        default_color: Color3,
    ) -> Result<(), RenderError> {
        if let Some((dx, dy, dz)) = self.raster_shift(from, to)? {
            self.duplicate_buffer(dx, dy, dz, use_default_color, default_color);
        }
        Ok(())
    }

    /// [`ZBufferEngine::periodize_buffer`] by the raster offset of `from -> to`
    pub fn periodize_buffer_world(
        &self,
        from: DVec3,
        to: DVec3,
        use_default_color: bool,
        default_color: Color3,
    ) -> Result<(), RenderError> {
        if let Some((dx, dy, dz)) = self.raster_shift(from, to)? {
            self.periodize_buffer(dx, dy, dz, use_default_color, default_color);
        }
        Ok(())
    }

    /// Number of covered pixels per packed id, sorted by id
    pub fn pixel_counts_per_id(&self) -> Result<Vec<(u32, usize)>, RenderError> {
        let frame = self.core.frame_buffer().ok_or(RenderError::NoFrameBuffer)?;
        let format = self.core.id_format.unwrap_or(Color4Format::Argb);
        let depth = self.core.depth_buffer();

        let width = self.width();
        let mut counts = BTreeMap::new();
        for (i, color) in frame.pixels().enumerate() {
            let (x, y) = ((i as u32) % width, (i as u32) / width);
            if depth.get(x, y) != Some(DepthBuffer::FAR) {
                *counts.entry(color.to_uint(format)).or_insert(0) += 1;
            }
        }
        Ok(counts.into_iter().collect())
    }

    pub fn depth_at(&self, x: u32, y: u32) -> Option<f64> {
        self.core.depth_buffer().get(x, y)
    }

    pub fn depth_buffer(&self) -> &DepthBuffer {
        self.core.depth_buffer()
    }

    pub fn frame_buffer_at(&self, x: u32, y: u32) -> Option<Color4> {
        self.core.frame_buffer_at(x, y)
    }
}

impl ProjectionEngine for ZBufferEngine {
    type Error = RenderError;

    fn size(&self) -> (u32, u32) {
        (self.width(), self.height())
    }

    fn set_camera(&mut self, camera: Arc<dyn ProjectionCamera>) {
        self.camera = Some(camera);
    }

    fn begin_process(&mut self) -> Result<(), RenderError> {
        if self.core.is_multithreaded() {
            self.core.tasks().init_tasks()?;
        }
        Ok(())
    }

    fn end_process(&mut self) -> Result<(), RenderError> {
        if self.core.is_multithreaded() {
            self.core.tasks().join()?;
        }
        Ok(())
    }

    /// Render every shape of `scene`, bracketed by begin/end process
    ///
    /// Large scenes are split into one contiguous range of shapes per
    /// worker thread, each range with its own camera and shader copy.
    fn process(&mut self, scene: &Arc<Scene>) -> Result<(), RenderError> {
        let camera = self.resolve_camera(None)?;
        self.begin_process()?;

        let n = scene.len();
        let tasks = Arc::clone(self.core.tasks());
        // Inline tasks run on the calling thread
        if self.core.is_multithreaded()
            && !tasks.is_inline()
            && n > self.core.config().parallel_shape_count
        {
            let chunk = n.div_ceil(tasks.nb_threads().max(1));
            log(LogCategory::Scene, LogLevel::Debug, || {
                format!("Splitting {} shapes into chunks of {}", n, chunk)
            });
            for start in (0..n).step_by(chunk) {
                let end = (start + chunk).min(n);
                let scene = Arc::clone(scene);
                let core = Arc::clone(&self.core);
                let task_camera = camera.copy();
                let mut shader = self.triangle_shader.as_ref().map(|s| s.copy(true));
                tasks.new_task(move || {
                    if let Some(s) = shader.as_mut() {
                        s.init_env(&task_camera);
                    }
                    core.process_shapes(&scene.shapes[start..end], &task_camera, &mut shader);
                });
            }
        } else {
            self.core
                .process_shapes(&scene.shapes, &camera, &mut self.triangle_shader);
        }

        self.end_process()
    }

    /// Frame buffer contents; `None` for depth-only engines
    fn get_image(&self) -> Option<Image> {
        self.core.frame_buffer().map(FrameBuffer::to_image)
    }

    fn clear(&mut self) {
        self.core.clear();
    }

    fn name(&self) -> &str {
        "ZBufferEngine"
    }
}

impl std::fmt::Debug for ZBufferEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZBufferEngine")
            .field("width", &self.width())
            .field("height", &self.height())
            .field("style", &self.style)
            .field("camera", &self.camera)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine(style: RenderingStyle) -> ZBufferEngine {
        ZBufferEngine::with_config(
            8,
            8,
            Color4::BLACK,
            style,
            RenderConfig::single_threaded(),
            Arc::new(TaskManager::inline()),
        )
    }

    #[test]
    fn test_style_allocates_frame_buffer() {
        assert!(engine(RenderingStyle::DepthOnly).get_image().is_none());
        let color = engine(RenderingStyle::ColorBased).get_image().unwrap();
        assert_eq!(color.channels(), 3);
        let id = engine(RenderingStyle::IdBased).get_image().unwrap();
        assert_eq!(id.channels(), 4);
    }

    #[test]
    fn test_missing_camera_is_an_error() {
        let mut engine = engine(RenderingStyle::ColorBased);
        let result = engine.render_point(DVec3::ZERO, Color4::WHITE, 1, None);
        assert!(matches!(result, Err(RenderError::NoCamera)));
        let scene = Arc::new(Scene::new());
        assert!(matches!(engine.process(&scene), Err(RenderError::NoCamera)));
        assert!(matches!(
            engine.is_visible_world(DVec3::ZERO),
            Err(RenderError::NoCamera)
        ));
    }

    #[test]
    fn test_id_engine_background() {
        let engine = ZBufferEngine::with_id_config(
            4,
            4,
            7,
            Color4Format::Rgba,
            RenderConfig::single_threaded(),
            Arc::new(TaskManager::inline()),
        );
        assert_eq!(
            engine.frame_buffer_at(0, 0).map(|c| c.to_uint(Color4Format::Rgba)),
            Some(7)
        );
        // Nothing drawn yet, so nothing is covered
        assert!(engine.pixel_counts_per_id().unwrap().is_empty());
    }

    #[test]
    fn test_pixel_counts_without_frame_buffer() {
        let engine = engine(RenderingStyle::DepthOnly);
        assert!(matches!(
            engine.pixel_counts_per_id(),
            Err(RenderError::NoFrameBuffer)
        ));
    }

    #[test]
    fn test_set_light_uses_one_color() {
        let engine = engine(RenderingStyle::ColorBased);
        engine.set_light(DVec3::Y, Color3::RED);
        let light = engine.core().light();
        assert_eq!(light.position, DVec3::Y);
        assert_eq!(light.ambient, Color3::RED);
        assert_eq!(light.specular, Color3::RED);
    }
}
