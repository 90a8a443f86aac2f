// midas.rs - MiDaS monocular depth via ONNX Runtime
//
// Model output is relative inverse depth. It is normalized to [0, 1]
// (1 = near) and then pushed through the same range/polarity mapping as
// luminance, so NearBright puts the model's "near" at `range.min`.

use std::path::{Path, PathBuf};

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, RgbaImage};
use log::{debug, warn};
use ndarray::{Array2, Array4};
use ort::session::Session;
use ort::value::Value;

use super::{DepthEstimator, DepthPolarity, DepthRange, DepthSurface, LuminanceDepth, ensure_area};
use crate::error::ImageDecodeError;

const MIDAS_SIZE: u32 = 256;

// ImageNet normalization constants
const MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const STD: [f32; 3] = [0.229, 0.224, 0.225];

pub struct MidasDepth {
    model_path: PathBuf,
    range: DepthRange,
    polarity: DepthPolarity,
}

impl MidasDepth {
    pub fn new(model_path: impl Into<PathBuf>, range: DepthRange, polarity: DepthPolarity) -> Self {
        Self { model_path: model_path.into(), range, polarity }
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    fn fallback(&self, image: &RgbaImage) -> Result<DepthSurface, ImageDecodeError> {
        LuminanceDepth::new(self.range, self.polarity).estimate(image)
    }

    /// Normalized nearness in [0, 1] at the source resolution
    fn infer(&self, image: &RgbaImage) -> Option<Vec<Vec<f32>>> {
        let (tw, th) = image.dimensions();
        let mut session = Session::builder().ok()?.commit_from_file(&self.model_path).ok()?;

        let resized = DynamicImage::ImageRgba8(image.clone()).resize_exact(MIDAS_SIZE, MIDAS_SIZE, FilterType::Lanczos3);

        let mut input = Array4::<f32>::zeros((1, 3, MIDAS_SIZE as usize, MIDAS_SIZE as usize));
        for y in 0..MIDAS_SIZE {
            for x in 0..MIDAS_SIZE {
                let p = resized.get_pixel(x, y);
                for c in 0..3 {
                    input[[0, c, y as usize, x as usize]] = (p[c] as f32 / 255.0 - MEAN[c]) / STD[c];
                }
            }
        }

        let input_val = Value::from_array(input).ok()?;
        let input_name = session.inputs.first().map(|i| i.name.clone()).unwrap_or_else(|| "image".into());
        let outputs = session.run(ort::inputs![input_name => input_val]).ok()?;
        let arr = outputs[0].try_extract_array::<f32>().ok()?;

        let shape = arr.shape();
        let (oh, ow) = match shape.len() {
            4 => (shape[2], shape[3]),
            3 => (shape[1], shape[2]),
            2 => (shape[0], shape[1]),
            _ => return None,
        };

        let flat: Vec<f32> = arr.iter().copied().collect();
        let (min_d, max_d) = flat.iter().fold((f32::MAX, f32::MIN), |(mn, mx), &v| (mn.min(v), mx.max(v)));
        let range = (max_d - min_d).max(1e-6);
        debug!("midas output {ow}x{oh}, raw range {min_d}..{max_d}");

        Some(bilinear_resize(&flat, ow, oh, tw as usize, th as usize, min_d, range))
    }
}

impl DepthEstimator for MidasDepth {
    fn estimate(&self, image: &RgbaImage) -> Result<DepthSurface, ImageDecodeError> {
        let (w, h) = image.dimensions();
        ensure_area(w, h)?;

        if !self.model_path.exists() {
            warn!("depth model {} not found, using luminance", self.model_path.display());
            return self.fallback(image);
        }

        let Some(nearness) = self.infer(image) else {
            warn!("depth model inference failed, using luminance");
            return self.fallback(image);
        };

        // nearness 1 behaves like white under luminance mapping
        let data = Array2::from_shape_fn((h as usize, w as usize), |(y, x)| {
            self.range.map(nearness[y][x] as f64, self.polarity)
        });
        Ok(DepthSurface::from_array(data))
    }
}

fn bilinear_resize(
    src: &[f32],
    sw: usize,
    sh: usize,
    tw: usize,
    th: usize,
    min_d: f32,
    range: f32,
) -> Vec<Vec<f32>> {
    let (sx, sy) = (sw as f32 / tw as f32, sh as f32 / th as f32);
    let mut depth = vec![vec![0.0f32; tw]; th];

    for y in 0..th {
        for x in 0..tw {
            let (fx, fy) = (x as f32 * sx, y as f32 * sy);
            let (x0, y0) = ((fx as usize).min(sw - 1), (fy as usize).min(sh - 1));
            let (x1, y1) = ((x0 + 1).min(sw - 1), (y0 + 1).min(sh - 1));
            let (tx, ty) = (fx.fract(), fy.fract());

            let sample = |sx: usize, sy: usize| {
                let v = src.get(sy * sw + sx).copied().unwrap_or(min_d);
                (v - min_d) / range
            };

            depth[y][x] = sample(x0, y0) * (1.0 - tx) * (1.0 - ty)
                + sample(x1, y0) * tx * (1.0 - ty)
                + sample(x0, y1) * (1.0 - tx) * ty
                + sample(x1, y1) * tx * ty;
        }
    }

    depth
}
