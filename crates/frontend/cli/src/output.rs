//! PNG export of the engine buffers

use anyhow::{Context, Result};
use pgl_core::graphics::{DepthBuffer, Image};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

pub fn write_png(path: &Path, width: u32, height: u32, color: png::ColorType, data: &[u8]) -> Result<()> {
    let file = File::create(path).with_context(|| format!("cannot create {}", path.display()))?;
    let mut encoder = png::Encoder::new(BufWriter::new(file), width, height);
    encoder.set_color(color);
    encoder.set_depth(png::BitDepth::Eight);
    let mut writer = encoder.write_header()?;
    writer.write_image_data(data)?;
    Ok(())
}

pub fn write_image(path: &Path, image: &Image) -> Result<()> {
    let color = match image.channels() {
        3 => png::ColorType::Rgb,
        4 => png::ColorType::Rgba,
        n => anyhow::bail!("cannot export a {}-channel image", n),
    };
    write_png(path, image.width(), image.height(), color, image.as_raw())
}

/// Grayscale view of a depth buffer: near is white, empty pixels are black
pub fn depth_to_gray(depth: &DepthBuffer) -> Vec<u8> {
    let (near, far) = depth.depth_range().unwrap_or((0.0, 1.0));
    let span = (far - near).max(f64::EPSILON);
    let mut gray = Vec::with_capacity(depth.width() as usize * depth.height() as usize);
    for y in 0..depth.height() {
        for x in 0..depth.width() {
            let value = match depth.get(x, y) {
                Some(z) if z != DepthBuffer::FAR => 255.0 - 223.0 * (z - near) / span,
                _ => 0.0,
            };
            gray.push(value.round() as u8);
        }
    }
    gray
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_depth_to_gray_scale() {
        let depth = DepthBuffer::new(3, 1);
        depth.set(0, 0, 2.0);
        depth.set(1, 0, 4.0);
        assert_eq!(depth_to_gray(&depth), vec![255, 32, 0]);
    }
}
