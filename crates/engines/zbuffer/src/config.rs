//! Engine tuning knobs
//!
//! All fields have defaults, so a JSON file only needs to name what it
//! changes:
//!
//! ```json
//! { "multithreaded": false, "alpha_threshold": 0.95 }
//! ```

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Use the task manager and per-tile pixel locks
    pub multithreaded: bool,
    /// Colors whose transparency reaches this value are not drawn
    pub alpha_threshold: f64,
    /// Minimum depth gain for a fragment to replace the stored one
    pub depth_epsilon: f64,
    /// Triangles covering more pixels than this are rasterized as tasks
    pub parallel_pixel_area: u64,
    /// Scenes with more shapes than this are split across threads
    pub parallel_shape_count: usize,
    /// Side of the square pixel tiles sharing one lock
    pub mutex_tile_size: u32,
    /// Shade materials with the scene light instead of flat colors
    pub lighting: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            multithreaded: true,
            alpha_threshold: 0.99,
            depth_epsilon: 1e-5,
            parallel_pixel_area: 20,
            parallel_shape_count: 100,
            mutex_tile_size: 8,
            lighting: true,
        }
    }
}

impl RenderConfig {
    /// Defaults with every pass running on the calling thread
    pub fn single_threaded() -> Self {
        Self {
            multithreaded: false,
            ..Self::default()
        }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: RenderConfig =
            serde_json::from_str(r#"{"multithreaded": false, "mutex_tile_size": 4}"#).unwrap();
        assert!(!config.multithreaded);
        assert_eq!(config.mutex_tile_size, 4);
        assert_eq!(config.alpha_threshold, 0.99);
        assert_eq!(config.parallel_pixel_area, 20);
        assert_eq!(config.parallel_shape_count, 100);
    }

    #[test]
    fn test_load_reports_path() {
        let dir = std::env::temp_dir().join(format!("pgl-config-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();

        let missing = dir.join("missing.json");
        match RenderConfig::load(&missing) {
            Err(ConfigError::Io { path, .. }) => assert_eq!(path, missing),
            other => panic!("expected Io error, got {:?}", other),
        }

        let broken = dir.join("broken.json");
        fs::write(&broken, "{ not json").unwrap();
        assert!(matches!(
            RenderConfig::load(&broken),
            Err(ConfigError::Parse { .. })
        ));

        let good = dir.join("good.json");
        fs::write(&good, r#"{"lighting": false}"#).unwrap();
        let config = RenderConfig::load(&good).unwrap();
        assert!(!config.lighting);
        assert!(config.multithreaded);

        fs::remove_dir_all(&dir).ok();
    }
}
