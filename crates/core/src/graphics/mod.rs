//! Pixel-level building blocks shared by the rendering engines
//!
//! Colors, owned images, and the depth/color buffers a software
//! rasterizer writes into.

pub mod color;
pub mod framebuffer;
pub mod image;
pub mod zbuffer;

pub use color::{Color3, Color4, Color4Format};
pub use framebuffer::FrameBuffer;
pub use image::Image;
pub use zbuffer::DepthBuffer;
