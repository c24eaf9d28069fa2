//! Shape visitor that feeds scene geometry to an [`EngineCore`]

use crate::engine_core::EngineCore;
use crate::shader::{ShaderContext, ShaderSlot};
use pgl_core::camera::ProjectionCamera;
use pgl_core::graphics::Color4;
use pgl_core::logging::{log, LogCategory, LogLevel};
use pgl_core::scene::{PointSet, Polyline, Shape, ShapeVisitor, TriangleSet};
use std::sync::Arc;

pub struct SceneRenderer<'a> {
    core: &'a Arc<EngineCore>,
    camera: &'a Arc<dyn ProjectionCamera>,
    shader: &'a mut ShaderSlot,
}

impl<'a> SceneRenderer<'a> {
    pub fn new(
        core: &'a Arc<EngineCore>,
        camera: &'a Arc<dyn ProjectionCamera>,
        shader: &'a mut ShaderSlot,
    ) -> Self {
        Self {
            core,
            camera,
            shader,
        }
    }
}

/// Colors of a point list: per point when given, the material color otherwise
fn point_colors<'c>(
    colors: Option<&'c Vec<Color4>>,
    default: Color4,
) -> impl Fn(usize) -> Color4 + 'c {
    move |i| colors.and_then(|c| c.get(i)).copied().unwrap_or(default)
}

impl ShapeVisitor for SceneRenderer<'_> {
    fn visit_triangles(&mut self, shape: &Shape, triangles: &TriangleSet) {
        for face in 0..triangles.face_count() {
            let Some(points) = triangles.face_points(face) else {
                log(LogCategory::Scene, LogLevel::Debug, || {
                    format!("Shape {}: face {} has an invalid index", shape.id, face)
                });
                continue;
            };
            if let Some(shader) = self.shader.as_mut() {
                shader.init(&ShaderContext {
                    appearance: shape.appearance.as_ref(),
                    geometry: triangles,
                    face,
                    id: shape.id,
                    camera: self.camera,
                });
            }
            self.core
                .render_shaded_triangle(points, triangles.ccw, self.shader, self.camera);
        }
    }

    fn visit_points(&mut self, shape: &Shape, points: &PointSet) {
        let color = point_colors(points.colors.as_ref(), shape.material().color4());
        for (i, p) in points.points.iter().enumerate() {
            self.core
                .render_point(*p, color(i), points.width, self.camera.as_ref());
        }
    }

    fn visit_polyline(&mut self, shape: &Shape, polyline: &Polyline) {
        let color = point_colors(polyline.colors.as_ref(), shape.material().color4());
        for (i, pair) in polyline.points.windows(2).enumerate() {
            self.core.render_segment(
                [pair[0], pair[1]],
                [color(i), color(i + 1)],
                polyline.width,
                self.camera.as_ref(),
            );
        }
    }
}

impl EngineCore {
    /// Render a run of shapes on the calling thread
    pub fn process_shapes(
        self: &Arc<Self>,
        shapes: &[Shape],
        camera: &Arc<dyn ProjectionCamera>,
        shader: &mut ShaderSlot,
    ) {
        log(LogCategory::Scene, LogLevel::Debug, || {
            format!("Rendering {} shape(s)", shapes.len())
        });
        let mut renderer = SceneRenderer::new(self, camera, shader);
        for shape in shapes {
            shape.apply(&mut renderer);
        }
    }
}
