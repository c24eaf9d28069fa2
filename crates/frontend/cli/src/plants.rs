//! Procedural plant rows used when no scene file is given
//!
//! Plants stand on the `y = 0` ground plane, columns along `X` and rows
//! along `Z`. Every part of a plant shares the plant's shape id, the ground
//! uses id 0.

use glam::DVec3;
use pgl_core::graphics::Color3;
use pgl_core::scene::{Appearance, Geometry, Material, PointSet, Polyline, Scene, Shape, TriangleSet};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f64::consts::TAU;

pub const PLANT_SPACING: f64 = 1.0;
pub const ROW_SPACING: f64 = 1.5;

fn material(color: Color3) -> Option<Appearance> {
    Some(Appearance::Material(Material {
        ambient: color.scale(0.4),
        diffuse: 2.0,
        specular: Color3::new(20, 20, 20),
        ..Material::default()
    }))
}

fn ground(rows: u32, cols: u32) -> Shape {
    let (x1, z1) = (cols as f64 * PLANT_SPACING, rows as f64 * ROW_SPACING);
    let mut mesh = TriangleSet::new(
        vec![
            DVec3::new(0.0, 0.0, 0.0),
            DVec3::new(x1, 0.0, 0.0),
            DVec3::new(x1, 0.0, z1),
            DVec3::new(0.0, 0.0, z1),
        ],
        vec![[0, 2, 1], [0, 3, 2]],
    );
    mesh.normals = Some(vec![DVec3::Y; 4]);
    Shape::new(0, Geometry::Triangles(mesh), material(Color3::new(110, 80, 50)))
}

/// Diamond shaped leaf made of two triangles
fn push_leaf(mesh: &mut TriangleSet, base: DVec3, direction: DVec3, length: f64) {
    let side = direction.cross(DVec3::Y).normalize_or_zero() * length * 0.2;
    let middle = base + direction * length * 0.5 + DVec3::Y * length * 0.15;
    let first = mesh.points.len() as u32;
    mesh.points.extend([
        base,
        middle + side,
        base + direction * length + DVec3::Y * length * 0.1,
        middle - side,
    ]);
    mesh.indices.push([first, first + 1, first + 2]);
    mesh.indices.push([first, first + 2, first + 3]);
}

fn plant(id: u32, foot: DVec3, rng: &mut StdRng) -> Vec<Shape> {
    let height = rng.gen_range(0.6..1.2);
    let top = foot + DVec3::Y * height;
    let green = Color3::new(rng.gen_range(30..70), rng.gen_range(140..210), rng.gen_range(30..70));

    let mut leaves = TriangleSet::new(Vec::new(), Vec::new());
    for _ in 0..rng.gen_range(3..7) {
        let angle = rng.gen_range(0.0..TAU);
        let direction = DVec3::new(angle.cos(), rng.gen_range(0.1..0.5), angle.sin()).normalize();
        let base = foot + DVec3::Y * rng.gen_range(0.2..0.9) * height;
        push_leaf(&mut leaves, base, direction, rng.gen_range(0.25..0.45));
    }

    let stem = Polyline {
        points: vec![foot, foot.lerp(top, 0.5) + DVec3::X * 0.02, top],
        colors: None,
        width: 2,
    };
    let flower = PointSet {
        points: vec![top],
        colors: None,
        width: 4,
    };

    vec![
        Shape::new(id, Geometry::Polyline(stem), material(Color3::new(60, 110, 40))),
        Shape::new(id, Geometry::Triangles(leaves), material(green)),
        Shape::new(
            id,
            Geometry::Points(flower),
            Some(Appearance::Material(Material::from_color(Color3::new(240, 210, 40)))),
        ),
    ]
}

/// `rows x cols` plants on a ground plane, reproducible for a given seed
pub fn plant_rows(rows: u32, cols: u32, seed: u64) -> Scene {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut scene = Scene::new();
    scene.add(ground(rows, cols));
    for r in 0..rows {
        for c in 0..cols {
            let jitter = DVec3::new(rng.gen_range(-0.1..0.1), 0.0, rng.gen_range(-0.1..0.1));
            let foot = DVec3::new(
                (c as f64 + 0.5) * PLANT_SPACING,
                0.0,
                (r as f64 + 0.5) * ROW_SPACING,
            ) + jitter;
            for shape in plant(1 + r * cols + c, foot, &mut rng) {
                scene.add(shape);
            }
        }
    }
    scene
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plant_rows_are_reproducible() {
        let a = plant_rows(2, 3, 42);
        let b = plant_rows(2, 3, 42);
        assert_eq!(a, b);
        // Ground plus three shapes per plant
        assert_eq!(a.len(), 1 + 2 * 3 * 3);
        assert_ne!(a, plant_rows(2, 3, 43));
    }

    #[test]
    fn test_plants_stand_on_the_ground() {
        let scene = plant_rows(1, 4, 1);
        let (lo, hi) = scene.bounding_box().unwrap();
        assert!(lo.y >= -1e-9);
        assert!(hi.y > 0.5);
        assert!(hi.x <= 4.0 * PLANT_SPACING + 0.5);
    }
}
