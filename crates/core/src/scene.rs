//! Minimal scene contract consumed by the projection engines
//!
//! Only what a rasterizer needs is modeled here: point and index lists,
//! optional per-vertex or per-face colors, normals and texture coordinates,
//! and an appearance. Shapes dispatch to a [`ShapeVisitor`] so that an
//! engine can handle each geometry kind without downcasting.

use crate::graphics::{Color3, Color4};
use glam::{DVec2, DVec3};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Surface material
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Material {
    pub name: String,
    pub ambient: Color3,
    /// Diffuse factor applied to the ambient color
    pub diffuse: f64,
    pub specular: Color3,
    pub emission: Color3,
    /// Specular exponent factor in [0, 1]
    pub shininess: f64,
    /// 0 = opaque, 1 = invisible
    pub transparency: f64,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            name: String::new(),
            ambient: Color3::new(80, 80, 80),
            diffuse: 2.0,
            specular: Color3::new(40, 40, 40),
            emission: Color3::BLACK,
            shininess: 0.2,
            transparency: 0.0,
        }
    }
}

impl Material {
    /// Flat material of a single color
    pub fn from_color(ambient: Color3) -> Self {
        Self {
            ambient,
            diffuse: 1.0,
            ..Self::default()
        }
    }

    pub fn diffuse_color(&self) -> Color3 {
        self.ambient.scale(self.diffuse)
    }

    /// Ambient color with the material transparency
    pub fn color4(&self) -> Color4 {
        Color4::from_transparency(self.ambient, self.transparency)
    }
}

/// Image texture with a fallback material
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Texture2D {
    pub filename: PathBuf,
    #[serde(default)]
    pub base: Material,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Appearance {
    Material(Material),
    Texture(Texture2D),
}

impl Appearance {
    /// Material to fall back on when a texture is unusable
    pub fn material(&self) -> &Material {
        match self {
            Appearance::Material(m) => m,
            Appearance::Texture(t) => &t.base,
        }
    }
}

impl Default for Appearance {
    fn default() -> Self {
        Appearance::Material(Material::default())
    }
}

fn default_true() -> bool {
    true
}

fn default_width() -> u32 {
    1
}

/// Indexed triangle mesh
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TriangleSet {
    pub points: Vec<DVec3>,
    pub indices: Vec<[u32; 3]>,
    /// Counter-clockwise front faces
    #[serde(default = "default_true")]
    pub ccw: bool,
    /// Per-vertex colors, or per-face colors when `color_per_vertex` is false
    #[serde(default)]
    pub colors: Option<Vec<Color4>>,
    #[serde(default = "default_true")]
    pub color_per_vertex: bool,
    /// Per-vertex normals
    #[serde(default)]
    pub normals: Option<Vec<DVec3>>,
    /// Per-vertex texture coordinates
    #[serde(default)]
    pub tex_coords: Option<Vec<DVec2>>,
}

impl TriangleSet {
    pub fn new(points: Vec<DVec3>, indices: Vec<[u32; 3]>) -> Self {
        Self {
            points,
            indices,
            ccw: true,
            color_per_vertex: true,
            ..Self::default()
        }
    }

    pub fn face_count(&self) -> usize {
        self.indices.len()
    }

    pub fn has_colors(&self) -> bool {
        self.colors.is_some()
    }

    /// Corner positions of a face, `None` if any index is out of range
    pub fn face_points(&self, face: usize) -> Option<[DVec3; 3]> {
        let idx = self.indices.get(face)?;
        Some([
            *self.points.get(idx[0] as usize)?,
            *self.points.get(idx[1] as usize)?,
            *self.points.get(idx[2] as usize)?,
        ])
    }

    /// Corner colors of a face, expanding per-face colors
    pub fn face_colors(&self, face: usize) -> Option<[Color4; 3]> {
        let colors = self.colors.as_ref()?;
        if self.color_per_vertex {
            let idx = self.indices.get(face)?;
            Some([
                *colors.get(idx[0] as usize)?,
                *colors.get(idx[1] as usize)?,
                *colors.get(idx[2] as usize)?,
            ])
        } else {
            let c = *colors.get(face)?;
            Some([c; 3])
        }
    }

    /// Geometric normal of a face, oriented by `ccw`
    pub fn face_normal(&self, face: usize) -> Option<DVec3> {
        let [a, b, c] = self.face_points(face)?;
        let n = (b - a).cross(c - a).normalize_or_zero();
        Some(if self.ccw { n } else { -n })
    }

    /// Corner normals of a face, falling back to the face normal
    pub fn face_normals(&self, face: usize) -> Option<[DVec3; 3]> {
        if let (Some(normals), Some(idx)) = (self.normals.as_ref(), self.indices.get(face)) {
            if let (Some(a), Some(b), Some(c)) = (
                normals.get(idx[0] as usize),
                normals.get(idx[1] as usize),
                normals.get(idx[2] as usize),
            ) {
                return Some([*a, *b, *c]);
            }
        }
        self.face_normal(face).map(|n| [n; 3])
    }

    /// Corner texture coordinates of a face
    pub fn face_tex_coords(&self, face: usize) -> Option<[DVec2; 3]> {
        let uv = self.tex_coords.as_ref()?;
        let idx = self.indices.get(face)?;
        Some([
            *uv.get(idx[0] as usize)?,
            *uv.get(idx[1] as usize)?,
            *uv.get(idx[2] as usize)?,
        ])
    }
}

/// Unconnected points drawn as squares of `width` pixels
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PointSet {
    pub points: Vec<DVec3>,
    #[serde(default)]
    pub colors: Option<Vec<Color4>>,
    #[serde(default = "default_width")]
    pub width: u32,
}

/// Connected line strip
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Polyline {
    pub points: Vec<DVec3>,
    #[serde(default)]
    pub colors: Option<Vec<Color4>>,
    #[serde(default = "default_width")]
    pub width: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Geometry {
    Triangles(TriangleSet),
    Points(PointSet),
    Polyline(Polyline),
}

impl Geometry {
    fn points(&self) -> &[DVec3] {
        match self {
            Geometry::Triangles(t) => &t.points,
            Geometry::Points(p) => &p.points,
            Geometry::Polyline(l) => &l.points,
        }
    }
}

/// Double-dispatch target for [`Shape::apply`]
pub trait ShapeVisitor {
    fn visit_triangles(&mut self, shape: &Shape, triangles: &TriangleSet);
    fn visit_points(&mut self, shape: &Shape, points: &PointSet);
    fn visit_polyline(&mut self, shape: &Shape, polyline: &Polyline);
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shape {
    pub id: u32,
    pub geometry: Geometry,
    #[serde(default)]
    pub appearance: Option<Appearance>,
}

impl Shape {
    pub fn new(id: u32, geometry: Geometry, appearance: Option<Appearance>) -> Self {
        Self {
            id,
            geometry,
            appearance,
        }
    }

    pub fn apply(&self, visitor: &mut dyn ShapeVisitor) {
        match &self.geometry {
            Geometry::Triangles(t) => visitor.visit_triangles(self, t),
            Geometry::Points(p) => visitor.visit_points(self, p),
            Geometry::Polyline(l) => visitor.visit_polyline(self, l),
        }
    }

    /// Material to use, the default material when none is set
    pub fn material(&self) -> Material {
        self.appearance
            .as_ref()
            .map(|a| a.material().clone())
            .unwrap_or_default()
    }
}

/// Ordered collection of shapes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    pub shapes: Vec<Shape>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, shape: Shape) {
        self.shapes.push(shape);
    }

    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Shape> {
        self.shapes.iter()
    }

    /// Axis-aligned bounds of every point in the scene
    pub fn bounding_box(&self) -> Option<(DVec3, DVec3)> {
        self.shapes
            .iter()
            .flat_map(|s| s.geometry.points().iter().copied())
            .fold(None, |acc, p| match acc {
                None => Some((p, p)),
                Some((lo, hi)) => Some((lo.min(p), hi.max(p))),
            })
    }
}
