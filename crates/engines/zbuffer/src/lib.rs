//! Software z-buffer rasterizer.
//!
//! Projects scenes through a [`ProjectionCamera`](pgl_core::ProjectionCamera)
//! into depth, color or id buffers. Large triangles and large scenes are
//! spread over a [`TaskManager`] thread pool; pixel writes are serialized
//! per tile by an [`ImageMutex`].

pub mod config;
pub mod engine;
pub mod engine_core;
pub mod error;
pub mod image_mutex;
mod periodize;
pub mod rasterizer;
pub mod scene_renderer;
pub mod shader;
pub mod task_manager;
pub mod texture_cache;

pub use config::RenderConfig;
pub use engine::{RenderingStyle, ZBufferEngine};
pub use engine_core::EngineCore;
pub use error::{ConfigError, RenderError, TextureError};
pub use image_mutex::{ImageMutex, PixelGuard};
pub use shader::{
    ColorBasedShader, IdBasedShader, Light, LitShader, ShaderContext, ShaderSlot, TexturedShader,
    TriangleShader, TriangleShaderSelector,
};
pub use task_manager::TaskManager;
pub use texture_cache::TextureCache;
