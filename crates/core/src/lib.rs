//! Core rendering primitives and traits.
//!
//! Shared by every projection engine: pixel types and buffers, cameras,
//! the minimal scene description engines consume, and category logging.

pub mod camera;
pub mod graphics;
pub mod logging;
pub mod renderer;
pub mod scene;

pub use camera::{OrthographicCamera, PerspectiveCamera, ProjectionCamera};
pub use glam::{DVec2, DVec3};
pub use renderer::ProjectionEngine;
