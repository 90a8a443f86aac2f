// image_source.rs - Decode and resize the source image
//
// Output is always RGBA8 so the alpha channel is available to the
// synthesizer even for formats without one.

use std::path::Path;

use image::imageops::FilterType;
use image::{DynamicImage, RgbaImage};
use log::debug;

use crate::depth::ensure_area;
use crate::error::ImageDecodeError;

/// Target size after resizing. `height: None` keeps the aspect ratio.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OutputSize {
    pub width: u32,
    pub height: Option<u32>,
}

impl OutputSize {
    /// Resolve to concrete dimensions for a source of `src_w x src_h`
    pub fn resolve(self, src_w: u32, src_h: u32) -> (u32, u32) {
        let h = self.height.unwrap_or_else(|| {
            // Same truncation as int(w * (h / w))
            ((self.width as f64) * (src_h as f64 / src_w as f64)) as u32
        });
        (self.width, h.max(1))
    }
}

pub fn decode_file(path: &Path) -> Result<DynamicImage, ImageDecodeError> {
    Ok(image::open(path)?)
}

pub fn from_bytes(bytes: &[u8], size: Option<OutputSize>) -> Result<RgbaImage, ImageDecodeError> {
    let img = image::load_from_memory(bytes)?;
    prepare(img, size)
}

/// Convert to RGBA and resize. Pass `None` to keep the source resolution.
pub fn prepare(img: DynamicImage, size: Option<OutputSize>) -> Result<RgbaImage, ImageDecodeError> {
    let (src_w, src_h) = (img.width(), img.height());
    ensure_area(src_w, src_h)?;

    let resized = match size {
        Some(size) => {
            let (w, h) = size.resolve(src_w, src_h);
            ensure_area(w, h)?;
            debug!("resizing {src_w}x{src_h} -> {w}x{h}");
            img.resize_exact(w, h, FilterType::Lanczos3)
        }
        None => img,
    };

    Ok(resized.into_rgba8())
}
