//! Texture images shared by every shader of an engine
//!
//! Lookups are keyed by file path. A miss loads the PNG outside the map
//! lock, so a slow decode does not stall other shaders; if two threads miss
//! on the same key at once both decode and the first insert wins. Failed
//! loads are cached too, so a broken texture is reported once per pass
//! instead of once per triangle.

use crate::error::TextureError;
use pgl_core::graphics::Image;
use pgl_core::logging::{log, LogCategory, LogLevel};
use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

type Entry = Result<Arc<Image>, Arc<TextureError>>;

#[derive(Default)]
pub struct TextureCache {
    entries: Mutex<HashMap<PathBuf, Entry>>,
}

impl TextureCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<PathBuf, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Image stored at `path`, loading it on first use
    pub fn get(&self, path: &Path) -> Result<Arc<Image>, Arc<TextureError>> {
        if let Some(entry) = self.entries().get(path) {
            return entry.clone();
        }

        let loaded = load_png(path).map(Arc::new).map_err(Arc::new);
        match &loaded {
            Ok(image) => log(LogCategory::Texture, LogLevel::Debug, || {
                format!(
                    "Loaded texture {} ({}x{}, {} channels)",
                    path.display(),
                    image.width(),
                    image.height(),
                    image.channels()
                )
            }),
            Err(e) => log(LogCategory::Texture, LogLevel::Error, || e.to_string()),
        }

        self.entries()
            .entry(path.to_path_buf())
            .or_insert(loaded)
            .clone()
    }

    /// Store an already decoded image under `path`
    #[cfg(test)]
    pub(crate) fn insert(&self, path: impl Into<PathBuf>, image: Image) {
        self.entries().insert(path.into(), Ok(Arc::new(image)));
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    #[cfg(test)]
    pub(crate) fn clear(&self) {
        self.entries().clear();
    }
}

/// Decode a PNG into an [`Image`]
///
/// Palette and low bit depth images are expanded to 8-bit channels. PNG
/// alpha is an opacity, so it is inverted into the transparency channel
/// used by [`pgl_core::graphics::Color4`].
pub fn load_png(path: &Path) -> Result<Image, TextureError> {
    let file = File::open(path).map_err(|source| TextureError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let decode_error = |source| TextureError::Decode {
        path: path.to_path_buf(),
        source,
    };

    let mut decoder = png::Decoder::new(file);
    decoder.set_transformations(png::Transformations::EXPAND | png::Transformations::STRIP_16);
    let mut reader = decoder.read_info().map_err(decode_error)?;
    let mut buf = vec![0; reader.output_buffer_size()];
    let info = reader.next_frame(&mut buf).map_err(decode_error)?;
    buf.truncate(info.buffer_size());

    let (channels, data) = match info.color_type {
        png::ColorType::Grayscale => (1, buf),
        png::ColorType::Rgb => (3, buf),
        png::ColorType::Rgba => {
            for px in buf.chunks_exact_mut(4) {
                px[3] = 255 - px[3];
            }
            (4, buf)
        }
        png::ColorType::GrayscaleAlpha => {
            let data = buf
                .chunks_exact(2)
                .flat_map(|px| [px[0], px[0], px[0], 255 - px[1]])
                .collect();
            (4, data)
        }
        png::ColorType::Indexed => {
            return Err(TextureError::Unsupported {
                path: path.to_path_buf(),
                reason: "indexed color was not expanded".to_string(),
            })
        }
    };

    Image::from_raw(info.width, info.height, channels, data).ok_or_else(|| {
        TextureError::Unsupported {
            path: path.to_path_buf(),
            reason: format!(
                "{}x{} image with {} channels does not match its data",
                info.width, info.height, channels
            ),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pgl_core::graphics::Color4;
    use std::io::BufWriter;

    fn write_png(path: &Path, width: u32, height: u32, color: png::ColorType, data: &[u8]) {
        let file = File::create(path).unwrap();
        let mut encoder = png::Encoder::new(BufWriter::new(file), width, height);
        encoder.set_color(color);
        encoder.set_depth(png::BitDepth::Eight);
        let mut writer = encoder.write_header().unwrap();
        writer.write_image_data(data).unwrap();
    }

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("pgl-tex-{}-{}", std::process::id(), name))
    }

    #[test]
    fn test_load_rgba_inverts_alpha() {
        let path = temp_path("rgba.png");
        write_png(
            &path,
            2,
            1,
            png::ColorType::Rgba,
            &[255, 0, 0, 255, 0, 0, 255, 0],
        );
        let image = load_png(&path).unwrap();
        assert_eq!(image.channels(), 4);
        assert_eq!(image.pixel_at(0, 0), Some(Color4::new(255, 0, 0, 0)));
        assert_eq!(image.pixel_at(1, 0), Some(Color4::new(0, 0, 255, 255)));
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_cache_hits_share_the_image() {
        let path = temp_path("rgb.png");
        write_png(&path, 1, 1, png::ColorType::Rgb, &[10, 20, 30]);
        let cache = TextureCache::new();
        let a = cache.get(&path).unwrap();
        let b = cache.get(&path).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.pixel_at(0, 0), Some(Color4::opaque(10, 20, 30)));
        assert_eq!(cache.len(), 1);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_missing_file_is_cached_as_failure() {
        let path = temp_path("missing.png");
        let cache = TextureCache::new();
        let first = cache.get(&path).unwrap_err();
        assert!(matches!(*first, TextureError::Io { .. }));
        let second = cache.get(&path).unwrap_err();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_garbage_file_is_a_decode_error() {
        let path = temp_path("garbage.png");
        std::fs::write(&path, b"definitely not a png").unwrap();
        assert!(matches!(load_png(&path), Err(TextureError::Decode { .. })));
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_insert_preloaded() {
        let cache = TextureCache::new();
        assert!(cache.is_empty());
        cache.insert("memory://checker", Image::new(4, 4, 3));
        assert_eq!(cache.get(Path::new("memory://checker")).unwrap().width(), 4);
        cache.clear();
        assert!(cache.is_empty());
    }
}
