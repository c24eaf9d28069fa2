use anyhow::{Context, Result};
use clap::Parser;
use glam::DVec3;
use pgl_core::camera::{PerspectiveCamera, ProjectionCamera};
use pgl_core::graphics::{Color3, Color4, Color4Format};
use pgl_core::logging::{LogConfig, LogLevel};
use pgl_core::scene::Scene;
use pgl_core::ProjectionEngine;
use pgl_zbuffer::{RenderConfig, RenderingStyle, TaskManager, ZBufferEngine};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

mod output;
mod plants;

#[derive(Clone, Copy, PartialEq, Eq, Debug, clap::ValueEnum)]
enum Style {
    /// Shaded colors
    Color,
    /// Normalized depth as grayscale
    Depth,
    /// Packed shape ids (RGBA)
    Id,
}

#[derive(Parser)]
#[command(name = "pgl-render", about = "Headless z-buffer renderer")]
struct Args {
    #[arg(long, default_value_t = 640)]
    width: u32,

    #[arg(long, default_value_t = 480)]
    height: u32,

    #[arg(long, value_enum, default_value_t = Style::Color)]
    style: Style,

    /// PNG file to write
    #[arg(long, short, default_value = "render.png")]
    output: PathBuf,

    /// JSON scene to render instead of the generated plant rows
    #[arg(long)]
    scene: Option<PathBuf>,

    /// JSON render configuration
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    single_threaded: bool,

    /// Worker threads (default: cores + 1)
    #[arg(long)]
    threads: Option<usize>,

    #[arg(long, default_value_t = 3)]
    rows: u32,

    #[arg(long, default_value_t = 8)]
    cols: u32,

    #[arg(long, default_value_t = 1)]
    seed: u64,

    /// Duplicate the image both ways along X by this world distance
    #[arg(long, value_name = "DX")]
    periodize: Option<f64>,

    /// Engine log level: off, error, warn, info, debug, trace
    #[arg(long, default_value = "warn")]
    log_level: String,
}

fn load_scene(path: &Path) -> Result<Scene> {
    let file = File::open(path).with_context(|| format!("cannot open {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("invalid scene {}", path.display()))
}

/// Perspective camera looking down at the whole scene
fn framing_camera(scene: &Scene) -> Result<Arc<dyn ProjectionCamera>> {
    let (lo, hi) = scene.bounding_box().context("scene is empty")?;
    let center = (lo + hi) * 0.5;
    let extent = (hi - lo).length().max(1e-3);
    let eye = center + DVec3::new(0.0, 0.6 * extent, 1.1 * extent);
    Ok(Arc::new(PerspectiveCamera::look_at(
        eye,
        center,
        DVec3::Y,
        45.0,
        0.01 * extent,
        10.0 * extent,
    )))
}

fn build_engine(args: &Args, config: RenderConfig, tasks: Arc<TaskManager>) -> ZBufferEngine {
    match args.style {
        Style::Color => ZBufferEngine::with_config(
            args.width,
            args.height,
            Color4::opaque(25, 28, 40),
            RenderingStyle::ColorBased,
            config,
            tasks,
        ),
        Style::Depth => ZBufferEngine::with_config(
            args.width,
            args.height,
            Color4::BLACK,
            RenderingStyle::DepthOnly,
            config,
            tasks,
        ),
        Style::Id => ZBufferEngine::with_id_config(
            args.width,
            args.height,
            u32::MAX,
            Color4Format::Rgba,
            config,
            tasks,
        ),
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let level = LogLevel::from_str(&args.log_level)
        .with_context(|| format!("unknown log level {:?}", args.log_level))?;
    LogConfig::global().set_global_level(level);

    let mut config = match &args.config {
        Some(path) => RenderConfig::load(path)?,
        None => RenderConfig::default(),
    };
    if args.single_threaded {
        config.multithreaded = false;
    }
    let tasks = match args.threads {
        Some(n) => Arc::new(TaskManager::with_threads(n)),
        None if !config.multithreaded => Arc::new(TaskManager::inline()),
        None => TaskManager::shared(),
    };

    let scene = match &args.scene {
        Some(path) => load_scene(path)?,
        None => plants::plant_rows(args.rows, args.cols, args.seed),
    };
    log::info!("Scene has {} shape(s)", scene.len());
    let scene = Arc::new(scene);

    let mut engine = build_engine(&args, config, tasks);
    engine.set_camera(framing_camera(&scene)?);
    engine.set_light(DVec3::new(0.4, 1.0, 0.6), Color3::WHITE);

    let started = std::time::Instant::now();
    engine.process(&scene).context("render failed")?;
    log::info!(
        "{} rendered {}x{} in {:.1?}",
        engine.name(),
        args.width,
        args.height,
        started.elapsed()
    );

    if let Some(dx) = args.periodize {
        engine.periodize_buffer_world(DVec3::ZERO, DVec3::new(dx, 0.0, 0.0), false, Color3::BLACK)?;
    }

    match args.style {
        Style::Color | Style::Id => {
            let image = engine.get_image().context("engine kept no image")?;
            output::write_image(&args.output, &image)?;
        }
        Style::Depth => {
            let gray = output::depth_to_gray(engine.depth_buffer());
            output::write_png(&args.output, args.width, args.height, png::ColorType::Grayscale, &gray)?;
        }
    }

    if args.style == Style::Id {
        for (id, pixels) in engine.pixel_counts_per_id()? {
            println!("id {:>6}: {} pixel(s)", id, pixels);
        }
    }

    println!(
        "Wrote {} ({}x{}, {:?})",
        args.output.display(),
        args.width,
        args.height,
        args.style
    );
    Ok(())
}
