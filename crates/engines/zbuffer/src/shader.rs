//! Per-fragment shading strategies
//!
//! A shader is bound to one triangle at a time with
//! [`TriangleShader::init`], then called once per visible fragment with the
//! perspective-correct barycentric weights of that fragment. Shaders write
//! into the [`EngineCore`] they were built for; the caller already holds the
//! pixel lock and has updated the depth buffer.
//!
//! Shaders carry per-triangle state, so a shader is never shared between
//! threads: tasks get their own instance through [`TriangleShader::copy`].

use crate::engine_core::EngineCore;
use glam::{DVec2, DVec3};
use pgl_core::camera::ProjectionCamera;
use pgl_core::graphics::{Color3, Color4, Color4Format, Image};
use pgl_core::scene::{Appearance, Material, TriangleSet};
use std::sync::Arc;

/// Optional shader as stored by engines and tasks (`None` in depth-only mode)
pub type ShaderSlot = Option<Box<dyn TriangleShader>>;

/// Everything a shader may need to know about the triangle it will shade
pub struct ShaderContext<'a> {
    pub appearance: Option<&'a Appearance>,
    pub geometry: &'a TriangleSet,
    pub face: usize,
    /// Id of the shape the triangle belongs to
    pub id: u32,
    pub camera: &'a Arc<dyn ProjectionCamera>,
}

impl ShaderContext<'_> {
    fn material(&self) -> Material {
        self.appearance
            .map(|a| a.material().clone())
            .unwrap_or_default()
    }
}

pub trait TriangleShader: Send {
    /// Bind the shader to one face of `ctx.geometry`
    fn init(&mut self, ctx: &ShaderContext<'_>);

    /// Rebind camera dependent state, used when a task brings its own camera
    fn init_env(&mut self, _camera: &Arc<dyn ProjectionCamera>) {}

    /// Shade the fragment at `(x, y)` of depth `z`
    fn process(&mut self, x: u32, y: u32, z: f64, weights: [f64; 3]);

    /// Independent instance for another thread
    ///
    /// With `detach` the copy starts unbound, as if freshly constructed;
    /// otherwise it keeps the triangle it is bound to.
    fn copy(&self, detach: bool) -> Box<dyn TriangleShader>;
}

/// Directional light
///
/// `position` is the direction pointing toward the light, in world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Light {
    pub position: DVec3,
    pub ambient: Color3,
    pub diffuse: Color3,
    pub specular: Color3,
}

impl Default for Light {
    fn default() -> Self {
        Self {
            position: DVec3::Z,
            ambient: Color3::WHITE,
            diffuse: Color3::WHITE,
            specular: Color3::WHITE,
        }
    }
}

/// Barycentric blend of three vertex colors
#[derive(Clone)]
pub struct ColorBasedShader {
    core: Arc<EngineCore>,
    colors: [Color4; 3],
}

impl ColorBasedShader {
    pub fn new(core: Arc<EngineCore>) -> Self {
        Self {
            core,
            colors: [Color4::WHITE; 3],
        }
    }

    pub fn with_colors(core: Arc<EngineCore>, colors: [Color4; 3]) -> Self {
        Self { core, colors }
    }

    pub fn set_colors(&mut self, c0: Color4, c1: Color4, c2: Color4) {
        self.colors = [c0, c1, c2];
    }

    pub fn colors(&self) -> [Color4; 3] {
        self.colors
    }
}

impl TriangleShader for ColorBasedShader {
    /// Vertex colors of the face, or the material color on every corner
    fn init(&mut self, ctx: &ShaderContext<'_>) {
        self.colors = ctx
            .geometry
            .face_colors(ctx.face)
            .unwrap_or_else(|| [ctx.material().color4(); 3]);
    }

    fn process(&mut self, x: u32, y: u32, _z: f64, weights: [f64; 3]) {
        let color = Color4::barycentric(self.colors, weights);
        self.core.set_frame_buffer_at(x, y, color);
    }

    fn copy(&self, detach: bool) -> Box<dyn TriangleShader> {
        if detach {
            Box::new(Self::new(Arc::clone(&self.core)))
        } else {
            Box::new(self.clone())
        }
    }
}

/// Writes the shape id, packed as a color, for picking buffers
#[derive(Clone)]
pub struct IdBasedShader {
    core: Arc<EngineCore>,
    default_id: u32,
    id: u32,
    format: Color4Format,
}

impl IdBasedShader {
    pub fn new(core: Arc<EngineCore>, default_id: u32, format: Color4Format) -> Self {
        Self {
            core,
            default_id,
            id: default_id,
            format,
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }
}

impl TriangleShader for IdBasedShader {
    fn init(&mut self, ctx: &ShaderContext<'_>) {
        self.id = ctx.id;
    }

    fn process(&mut self, x: u32, y: u32, _z: f64, _weights: [f64; 3]) {
        self.core
            .write_raw(x, y, Color4::from_uint(self.id, self.format));
    }

    fn copy(&self, detach: bool) -> Box<dyn TriangleShader> {
        let mut copy = self.clone();
        if detach {
            copy.id = self.default_id;
        }
        Box::new(copy)
    }
}

/// Nearest-neighbour texture lookup with repeat wrapping
///
/// `v = 0` is the bottom row of the image.
pub fn sample_nearest(texture: &Image, uv: DVec2) -> Option<Color4> {
    let (w, h) = (texture.width(), texture.height());
    if w == 0 || h == 0 || !uv.is_finite() {
        return None;
    }
    let u = uv.x.rem_euclid(1.0);
    let v = uv.y.rem_euclid(1.0);
    let x = ((u * w as f64) as u32).min(w - 1);
    let y = (((1.0 - v) * h as f64) as u32).min(h - 1);
    texture.pixel_at(x, y)
}

/// Image texture mapped through per-vertex texture coordinates
#[derive(Clone)]
pub struct TexturedShader {
    core: Arc<EngineCore>,
    uv: [DVec2; 3],
    texture: Option<Arc<Image>>,
    /// Used when the texture could not be loaded
    fallback: Color4,
}

impl TexturedShader {
    pub fn new(core: Arc<EngineCore>) -> Self {
        Self {
            core,
            uv: [DVec2::ZERO; 3],
            texture: None,
            fallback: Material::default().color4(),
        }
    }

    pub fn has_texture(&self) -> bool {
        self.texture.is_some()
    }
}

impl TriangleShader for TexturedShader {
    fn init(&mut self, ctx: &ShaderContext<'_>) {
        self.fallback = ctx.material().color4();
        self.uv = ctx
            .geometry
            .face_tex_coords(ctx.face)
            .unwrap_or([DVec2::ZERO; 3]);
        self.texture = match ctx.appearance {
            Some(Appearance::Texture(t)) => self.core.textures().get(&t.filename).ok(),
            _ => None,
        };
    }

    fn process(&mut self, x: u32, y: u32, _z: f64, w: [f64; 3]) {
        let uv = self.uv[0] * w[0] + self.uv[1] * w[1] + self.uv[2] * w[2];
        let color = self
            .texture
            .as_deref()
            .and_then(|t| sample_nearest(t, uv))
            .unwrap_or(self.fallback);
        self.core.set_frame_buffer_at(x, y, color);
    }

    fn copy(&self, detach: bool) -> Box<dyn TriangleShader> {
        if detach {
            Box::new(Self::new(Arc::clone(&self.core)))
        } else {
            Box::new(self.clone())
        }
    }
}

/// Ambient, Lambert diffuse and Blinn specular terms under the engine light
///
/// Lighting is computed in camera space. Back faces are lit as if their
/// normal pointed at the viewer.
#[derive(Clone)]
pub struct LitShader {
    core: Arc<EngineCore>,
    material: Material,
    light: Light,
    world_points: [DVec3; 3],
    world_normals: [DVec3; 3],
    points: [DVec3; 3],
    normals: [DVec3; 3],
    light_dir: DVec3,
}

impl LitShader {
    pub fn new(core: Arc<EngineCore>) -> Self {
        Self {
            core,
            material: Material::default(),
            light: Light::default(),
            world_points: [DVec3::ZERO; 3],
            world_normals: [DVec3::Z; 3],
            points: [DVec3::ZERO; 3],
            normals: [DVec3::Z; 3],
            light_dir: DVec3::Z,
        }
    }

    /// Shade a camera-space surface point
    pub fn shade(&self, point: DVec3, normal: DVec3) -> Color4 {
        let view = (-point).normalize_or_zero();
        let mut n = normal.normalize_or_zero();
        if n.dot(view) < 0.0 {
            n = -n;
        }
        let l = self.light_dir;
        let diffuse = n.dot(l).max(0.0);
        let specular = if diffuse > 0.0 {
            let half = (l + view).normalize_or_zero();
            n.dot(half).max(0.0).powf(self.material.shininess * 128.0)
        } else {
            0.0
        };

        let m = &self.material;
        let rgb = m
            .emission
            .saturating_add(m.ambient.modulate(self.light.ambient))
            .saturating_add(m.diffuse_color().modulate(self.light.diffuse).scale(diffuse))
            .saturating_add(m.specular.modulate(self.light.specular).scale(specular));
        Color4::from_transparency(rgb, m.transparency)
    }
}

impl TriangleShader for LitShader {
    fn init(&mut self, ctx: &ShaderContext<'_>) {
        self.material = ctx.material();
        self.light = self.core.light();
        if let Some(points) = ctx.geometry.face_points(ctx.face) {
            self.world_points = points;
        }
        if let Some(normals) = ctx.geometry.face_normals(ctx.face) {
            self.world_normals = normals;
        }
        self.init_env(ctx.camera);
    }

    fn init_env(&mut self, camera: &Arc<dyn ProjectionCamera>) {
        let origin = camera.world_to_camera(DVec3::ZERO);
        let direction = |d: DVec3| (camera.world_to_camera(d) - origin).normalize_or_zero();
        self.points = self.world_points.map(|p| camera.world_to_camera(p));
        self.normals = self.world_normals.map(direction);
        self.light_dir = direction(self.light.position);
    }

    fn process(&mut self, x: u32, y: u32, _z: f64, w: [f64; 3]) {
        let point = self.points[0] * w[0] + self.points[1] * w[1] + self.points[2] * w[2];
        let normal = self.normals[0] * w[0] + self.normals[1] * w[1] + self.normals[2] * w[2];
        let color = self.shade(point, normal);
        self.core.set_frame_buffer_at(x, y, color);
    }

    fn copy(&self, detach: bool) -> Box<dyn TriangleShader> {
        if detach {
            Box::new(Self::new(Arc::clone(&self.core)))
        } else {
            Box::new(self.clone())
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActiveShader {
    Color,
    Textured,
    Lit,
}

/// Default shader of color engines: picks a sub-shader per triangle
///
/// Vertex colors win, then textures (when the mesh has texture
/// coordinates), then lit materials. With lighting disabled materials are
/// drawn flat.
#[derive(Clone)]
pub struct TriangleShaderSelector {
    color: ColorBasedShader,
    textured: TexturedShader,
    lit: LitShader,
    active: ActiveShader,
    lighting: bool,
}

impl TriangleShaderSelector {
    pub fn new(core: Arc<EngineCore>) -> Self {
        let lighting = core.config().lighting;
        Self {
            color: ColorBasedShader::new(Arc::clone(&core)),
            textured: TexturedShader::new(Arc::clone(&core)),
            lit: LitShader::new(core),
            active: ActiveShader::Color,
            lighting,
        }
    }

    pub fn active(&self) -> ActiveShader {
        self.active
    }

    fn active_mut(&mut self) -> &mut dyn TriangleShader {
        match self.active {
            ActiveShader::Color => &mut self.color,
            ActiveShader::Textured => &mut self.textured,
            ActiveShader::Lit => &mut self.lit,
        }
    }
}

impl TriangleShader for TriangleShaderSelector {
    fn init(&mut self, ctx: &ShaderContext<'_>) {
        let textured = matches!(ctx.appearance, Some(Appearance::Texture(_)))
            && ctx.geometry.tex_coords.is_some();
        self.active = if ctx.geometry.has_colors() {
            ActiveShader::Color
        } else if textured {
            ActiveShader::Textured
        } else if self.lighting {
            ActiveShader::Lit
        } else {
            ActiveShader::Color
        };
        self.active_mut().init(ctx);
    }

    fn init_env(&mut self, camera: &Arc<dyn ProjectionCamera>) {
        self.active_mut().init_env(camera);
    }

    fn process(&mut self, x: u32, y: u32, z: f64, weights: [f64; 3]) {
        self.active_mut().process(x, y, z, weights);
    }

    fn copy(&self, detach: bool) -> Box<dyn TriangleShader> {
        if detach {
            Box::new(Self::new(Arc::clone(&self.color.core)))
        } else {
            Box::new(self.clone())
        }
    }
}
