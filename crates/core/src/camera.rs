//! Projection cameras
//!
//! The rasterizer only needs three things from a camera: a world to camera
//! transform, a camera to raster transform for a given image size, and a
//! depth range test. Camera space follows the usual right-handed
//! convention: the camera sits at the origin and looks down `-Z`.
//! Raster depth is the positive distance along the view axis.
//!
//! ```text
//! world --(view matrix)--> camera --(projection)--> NDC --(viewport)--> raster
//! ```

use glam::{DMat4, DVec3};
use std::fmt::Debug;
use std::sync::Arc;

/// Camera contract consumed by the rendering engines
pub trait ProjectionCamera: Send + Sync + Debug {
    /// Transform a world-space point into camera space
    fn world_to_camera(&self, point: DVec3) -> DVec3;

    /// Project a camera-space point to raster space
    ///
    /// `x`/`y` are pixel coordinates (origin top-left), `z` is the depth.
    /// Points on or behind the eye plane project to non-finite `x`/`y`.
    fn camera_to_raster(&self, point: DVec3, width: u32, height: u32) -> DVec3;

    /// Valid depth interval `(near, far)`
    fn z_range(&self) -> (f64, f64);

    /// Independent copy for use by another thread
    fn copy(&self) -> Arc<dyn ProjectionCamera>;

    fn world_to_raster(&self, point: DVec3, width: u32, height: u32) -> DVec3 {
        self.camera_to_raster(self.world_to_camera(point), width, height)
    }

    /// Whether a single depth lies within `[near, far]`
    fn is_in_z_range(&self, z: f64) -> bool {
        let (near, far) = self.z_range();
        z >= near && z <= far
    }

    /// Whether the depth interval `[zmin, zmax]` intersects `[near, far]`
    fn overlaps_z_range(&self, zmin: f64, zmax: f64) -> bool {
        let (near, far) = self.z_range();
        zmax >= near && zmin <= far
    }
}

/// Perspective projection with a vertical field of view
#[derive(Debug, Clone)]
pub struct PerspectiveCamera {
    view: DMat4,
    /// Vertical field of view in radians
    fovy: f64,
    near: f64,
    far: f64,
}

impl PerspectiveCamera {
    /// Camera at `eye` looking at `center`
    ///
    /// `fovy_degrees` is the vertical field of view. The aspect ratio comes
    /// from the image size at projection time.
    pub fn look_at(
        eye: DVec3,
        center: DVec3,
        up: DVec3,
        fovy_degrees: f64,
        near: f64,
        far: f64,
    ) -> Self {
        Self {
            view: DMat4::look_at_rh(eye, center, up),
            fovy: fovy_degrees.to_radians(),
            near,
            far,
        }
    }
}

impl ProjectionCamera for PerspectiveCamera {
    fn world_to_camera(&self, point: DVec3) -> DVec3 {
        self.view.transform_point3(point)
    }

    fn camera_to_raster(&self, point: DVec3, width: u32, height: u32) -> DVec3 {
        let depth = -point.z;
        if depth <= f64::EPSILON {
            return DVec3::new(f64::NAN, f64::NAN, depth);
        }
        let focal = 1.0 / (self.fovy / 2.0).tan();
        let aspect = width as f64 / height.max(1) as f64;
        let ndc_x = point.x * focal / aspect / depth;
        let ndc_y = point.y * focal / depth;
        DVec3::new(
            (ndc_x + 1.0) / 2.0 * width as f64,
            (1.0 - ndc_y) / 2.0 * height as f64,
            depth,
        )
    }

    fn z_range(&self) -> (f64, f64) {
        (self.near, self.far)
    }

    fn copy(&self) -> Arc<dyn ProjectionCamera> {
        Arc::new(self.clone())
    }
}

/// Orthographic (parallel) projection
#[derive(Debug, Clone)]
pub struct OrthographicCamera {
    view: DMat4,
    /// Half extent of the view volume along camera X
    half_width: f64,
    /// Half extent of the view volume along camera Y
    half_height: f64,
    near: f64,
    far: f64,
}

impl OrthographicCamera {
    pub fn look_at(
        eye: DVec3,
        center: DVec3,
        up: DVec3,
        half_width: f64,
        half_height: f64,
        near: f64,
        far: f64,
    ) -> Self {
        Self {
            view: DMat4::look_at_rh(eye, center, up),
            half_width,
            half_height,
            near,
            far,
        }
    }
}

impl ProjectionCamera for OrthographicCamera {
    fn world_to_camera(&self, point: DVec3) -> DVec3 {
        self.view.transform_point3(point)
    }

    fn camera_to_raster(&self, point: DVec3, width: u32, height: u32) -> DVec3 {
        let ndc_x = point.x / self.half_width;
        let ndc_y = point.y / self.half_height;
        DVec3::new(
            (ndc_x + 1.0) / 2.0 * width as f64,
            (1.0 - ndc_y) / 2.0 * height as f64,
            -point.z,
        )
    }

    fn z_range(&self) -> (f64, f64) {
        (self.near, self.far)
    }

    fn copy(&self) -> Arc<dyn ProjectionCamera> {
        Arc::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: DVec3, b: DVec3) -> bool {
        (a - b).length() < 1e-9
    }

    #[test]
    fn test_perspective_center_maps_to_image_center() {
        let cam = PerspectiveCamera::look_at(DVec3::ZERO, DVec3::NEG_Z, DVec3::Y, 90.0, 0.1, 100.0);
        let raster = cam.world_to_raster(DVec3::new(0.0, 0.0, -5.0), 200, 100);
        assert!(close(raster, DVec3::new(100.0, 50.0, 5.0)), "{:?}", raster);
    }

    #[test]
    fn test_perspective_edge_of_frustum() {
        // 90 degrees vertical: at depth 2 the visible half height is 2
        let cam = PerspectiveCamera::look_at(DVec3::ZERO, DVec3::NEG_Z, DVec3::Y, 90.0, 0.1, 100.0);
        let top = cam.world_to_raster(DVec3::new(0.0, 2.0, -2.0), 100, 100);
        assert!(close(top, DVec3::new(50.0, 0.0, 2.0)), "{:?}", top);
    }

    #[test]
    fn test_perspective_behind_eye_is_not_finite() {
        let cam = PerspectiveCamera::look_at(DVec3::ZERO, DVec3::NEG_Z, DVec3::Y, 60.0, 0.1, 100.0);
        let raster = cam.world_to_raster(DVec3::new(0.0, 0.0, 3.0), 64, 64);
        assert!(!raster.x.is_finite());
        assert!(!cam.is_in_z_range(raster.z));
    }

    #[test]
    fn test_orthographic_corners() {
        let cam = OrthographicCamera::look_at(
            DVec3::new(0.0, 0.0, 10.0),
            DVec3::ZERO,
            DVec3::Y,
            4.0,
            2.0,
            1.0,
            20.0,
        );
        let top_left = cam.world_to_raster(DVec3::new(-4.0, 2.0, 0.0), 80, 40);
        assert!(close(top_left, DVec3::new(0.0, 0.0, 10.0)), "{:?}", top_left);
        let bottom_right = cam.world_to_raster(DVec3::new(4.0, -2.0, 1.0), 80, 40);
        assert!(close(bottom_right, DVec3::new(80.0, 40.0, 9.0)), "{:?}", bottom_right);
    }

    #[test]
    fn test_z_range_tests() {
        let cam = PerspectiveCamera::look_at(DVec3::ZERO, DVec3::NEG_Z, DVec3::Y, 60.0, 1.0, 10.0);
        assert!(cam.is_in_z_range(1.0));
        assert!(cam.is_in_z_range(10.0));
        assert!(!cam.is_in_z_range(0.5));
        assert!(!cam.is_in_z_range(10.5));
        assert!(cam.overlaps_z_range(0.5, 2.0));
        assert!(cam.overlaps_z_range(0.0, 20.0));
        assert!(!cam.overlaps_z_range(11.0, 20.0));
        assert!(!cam.overlaps_z_range(-3.0, 0.9));
    }

    #[test]
    fn test_copy_projects_identically() {
        let cam = PerspectiveCamera::look_at(
            DVec3::new(3.0, 2.0, 5.0),
            DVec3::ZERO,
            DVec3::Y,
            45.0,
            0.1,
            50.0,
        );
        let copy = cam.copy();
        let p = DVec3::new(0.3, -0.2, 0.1);
        assert!(close(cam.world_to_raster(p, 64, 48), copy.world_to_raster(p, 64, 48)));
    }
}
