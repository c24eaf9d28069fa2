//! Common projection engine trait
//!
//! A projection engine turns a [`Scene`] seen through a
//! [`ProjectionCamera`] into raster buffers. The z-buffer rasterizer is the
//! only implementation shipped today, but frontends only talk to this
//! trait.
//!
//! ```text
//! Scene + camera -> ProjectionEngine -> {image, depth, id buffer}
//! ```
//!
//! [`ProjectionEngine::process`] brackets itself. Primitives drawn one by
//! one go between an explicit begin/end pair:
//!
//! ```rust,ignore
//! engine.set_camera(camera);
//! engine.process(&scene)?;
//!
//! engine.begin_process()?;
//! engine.render_triangle(v, colors, true, None)?;
//! engine.end_process()?;
//! let image = engine.get_image();
//! ```

use crate::camera::ProjectionCamera;
use crate::graphics::Image;
use crate::scene::Scene;
use std::sync::Arc;

/// Common interface for scene projection engines
pub trait ProjectionEngine: Send {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Output size in pixels
    fn size(&self) -> (u32, u32);

    /// Install the camera used when an operation is not given one
    fn set_camera(&mut self, camera: Arc<dyn ProjectionCamera>);

    /// Start a render pass
    fn begin_process(&mut self) -> Result<(), Self::Error>;

    /// Finish a render pass, waiting for every outstanding task
    ///
    /// Buffers must not be read before this returns.
    fn end_process(&mut self) -> Result<(), Self::Error>;

    /// Render a whole scene
    fn process(&mut self, scene: &Arc<Scene>) -> Result<(), Self::Error>;

    /// Copy of the rendered image, `None` when the engine keeps no colors
    fn get_image(&self) -> Option<Image>;

    /// Reset every buffer to its background value
    fn clear(&mut self);

    /// Engine name (for logs)
    fn name(&self) -> &str;

    /// `true` for GPU-backed engines
    fn is_hardware_accelerated(&self) -> bool {
        false
    }
}
