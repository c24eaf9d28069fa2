use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use pgl_core::camera::{PerspectiveCamera, ProjectionCamera};
use pgl_core::graphics::{Color3, Color4};
use pgl_core::scene::{Appearance, Geometry, Material, Scene, Shape, TriangleSet};
use pgl_core::{DVec3, ProjectionEngine};
use pgl_zbuffer::{RenderConfig, RenderingStyle, TaskManager, ZBufferEngine};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;

const SIZE: u32 = 256;

fn camera() -> Arc<dyn ProjectionCamera> {
    Arc::new(PerspectiveCamera::look_at(
        DVec3::new(0.0, 0.0, 10.0),
        DVec3::ZERO,
        DVec3::Y,
        45.0,
        0.1,
        100.0,
    ))
}

fn engine(multithreaded: bool) -> ZBufferEngine {
    let (config, tasks) = if multithreaded {
        (RenderConfig::default(), TaskManager::shared())
    } else {
        (RenderConfig::single_threaded(), Arc::new(TaskManager::inline()))
    };
    let mut engine = ZBufferEngine::with_config(
        SIZE,
        SIZE,
        Color4::BLACK,
        RenderingStyle::ColorBased,
        config,
        tasks,
    );
    engine.set_camera(camera());
    engine
}

/// Random small triangles spread over the view
fn triangle_soup(count: usize) -> Arc<Scene> {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    let mut scene = Scene::new();
    for id in 0..count {
        let center = DVec3::new(
            rng.gen_range(-3.5..3.5),
            rng.gen_range(-3.5..3.5),
            rng.gen_range(-2.0..2.0),
        );
        let points = (0..3)
            .map(|_| {
                center
                    + DVec3::new(
                        rng.gen_range(-0.4..0.4),
                        rng.gen_range(-0.4..0.4),
                        rng.gen_range(-0.1..0.1),
                    )
            })
            .collect();
        let color = Color3::new(rng.gen(), rng.gen(), rng.gen());
        scene.add(Shape::new(
            id as u32,
            Geometry::Triangles(TriangleSet::new(points, vec![[0, 1, 2]])),
            Some(Appearance::Material(Material::from_color(color))),
        ));
    }
    Arc::new(scene)
}

fn bench_single_triangle(c: &mut Criterion) {
    let mut group = c.benchmark_group("zbuffer_triangle");

    for half in [0.1, 1.0, 4.0].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(half), half, |b, &half| {
            let engine = engine(false);
            let v = [
                DVec3::new(-half, -half, 0.0),
                DVec3::new(half, -half, 0.0),
                DVec3::new(0.0, half, 0.0),
            ];
            let colors = [Color4::opaque(255, 0, 0), Color4::opaque(0, 255, 0), Color4::opaque(0, 0, 255)];
            b.iter(|| {
                engine.depth_buffer().clear();
                engine.render_triangle(v, colors, true, None).ok();
                black_box(engine.depth_at(SIZE / 2, SIZE / 2));
            });
        });
    }

    group.finish();
}

fn bench_scene(c: &mut Criterion) {
    let mut group = c.benchmark_group("zbuffer_scene");
    group.sample_size(20);

    let scene = triangle_soup(2000);
    for (label, multithreaded) in [("inline", false), ("pool", true)] {
        group.bench_function(label, |b| {
            let mut engine = engine(multithreaded);
            b.iter(|| {
                engine.clear();
                engine.process(&scene).ok();
                black_box(engine.depth_buffer().covered_pixels());
            });
        });
    }

    group.finish();
}

fn bench_periodize(c: &mut Criterion) {
    let mut engine = engine(false);
    engine.process(&triangle_soup(200)).ok();
    c.bench_function("zbuffer_periodize", |b| {
        b.iter(|| {
            engine.periodize_buffer(black_box(64), 0, 0.0, false, Color3::BLACK);
        });
    });
}

criterion_group!(benches, bench_single_triangle, bench_scene, bench_periodize);
criterion_main!(benches);
