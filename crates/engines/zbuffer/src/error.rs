use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("No camera given and no default camera set")]
    NoCamera,
    #[error("Failed to build the render thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
    #[error("{failed} render task(s) panicked, first: {first}")]
    TaskFailed { failed: usize, first: String },
    #[error("Engine has no frame buffer")]
    NoFrameBuffer,
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Failure to load a texture image
#[derive(Debug, Error)]
pub enum TextureError {
    #[error("Cannot open texture {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Cannot decode texture {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: png::DecodingError,
    },
    #[error("Unsupported texture {}: {reason}", path.display())]
    Unsupported { path: PathBuf, reason: String },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
