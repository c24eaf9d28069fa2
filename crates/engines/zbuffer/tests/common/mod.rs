//! Shared helpers for the engine integration tests

#![allow(dead_code)]

use pgl_core::camera::ProjectionCamera;
use pgl_core::graphics::{Color3, Color4};
use pgl_core::scene::{Appearance, Geometry, Material, Shape, TriangleSet};
use pgl_core::DVec3;
use pgl_zbuffer::{RenderConfig, RenderingStyle, TaskManager, ZBufferEngine};
use std::sync::Arc;

/// Camera whose world space already is raster space
#[derive(Debug, Clone)]
pub struct ScreenCamera {
    pub near: f64,
    pub far: f64,
}

impl ScreenCamera {
    pub fn shared() -> Arc<dyn ProjectionCamera> {
        Arc::new(Self {
            near: 0.0,
            far: 1e9,
        })
    }
}

impl ProjectionCamera for ScreenCamera {
    fn world_to_camera(&self, point: DVec3) -> DVec3 {
        point
    }

    fn camera_to_raster(&self, point: DVec3, _width: u32, _height: u32) -> DVec3 {
        point
    }

    fn z_range(&self) -> (f64, f64) {
        (self.near, self.far)
    }

    fn copy(&self) -> Arc<dyn ProjectionCamera> {
        Arc::new(self.clone())
    }
}

pub fn single_threaded(width: u32, height: u32, style: RenderingStyle) -> ZBufferEngine {
    ZBufferEngine::with_config(
        width,
        height,
        Color4::BLACK,
        style,
        RenderConfig {
            lighting: false,
            ..RenderConfig::single_threaded()
        },
        Arc::new(TaskManager::inline()),
    )
}

/// Engine that sends every triangle and every scene to the pool
pub fn multi_threaded(width: u32, height: u32, style: RenderingStyle) -> ZBufferEngine {
    ZBufferEngine::with_config(
        width,
        height,
        Color4::BLACK,
        style,
        RenderConfig {
            lighting: false,
            parallel_pixel_area: 0,
            parallel_shape_count: 4,
            ..RenderConfig::default()
        },
        Arc::new(TaskManager::with_threads(4)),
    )
}

/// Right triangle with its corner at `(x, y)` and legs of `size` pixels
pub fn corner_triangle(x: f64, y: f64, size: f64, z: f64) -> [DVec3; 3] {
    [
        DVec3::new(x, y, z),
        DVec3::new(x + size, y, z),
        DVec3::new(x, y + size, z),
    ]
}

pub fn flat_shape(id: u32, v: [DVec3; 3], color: Color3) -> Shape {
    Shape::new(
        id,
        Geometry::Triangles(TriangleSet::new(v.to_vec(), vec![[0, 1, 2]])),
        Some(Appearance::Material(Material::from_color(color))),
    )
}
