// depth/ - Per-pixel viewer distance from a source image
//
// Default estimator is luminance based. Polarity decides whether bright
// pixels sit near or far; NearBright (white = min depth) is the default.

#[cfg(feature = "midas")]
mod midas;

#[cfg(feature = "midas")]
pub use midas::MidasDepth;

use image::{GrayImage, Luma, RgbaImage};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::color::Rgb;
use crate::error::{ConfigError, ImageDecodeError};

/// Which end of the depth range bright pixels map to
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DepthPolarity {
    /// White = `min`, black = `max`
    #[default]
    NearBright,
    /// Black = `min`, white = `max`
    NearDark,
}

/// Inclusive range of distances, in blocks, along the view direction
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepthRange {
    pub min: u32,
    pub max: u32,
}

impl DepthRange {
    pub fn new(min: u32, max: u32) -> Result<Self, ConfigError> {
        let range = Self { min, max };
        range.validate()?;
        Ok(range)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min > self.max {
            return Err(ConfigError::InvalidDepthRange { min: self.min, max: self.max });
        }
        Ok(())
    }

    pub fn span(&self) -> u32 {
        self.max - self.min
    }

    /// Map a brightness fraction (0 = black, 1 = white) into the range
    pub fn map(&self, brightness: f64, polarity: DepthPolarity) -> u32 {
        let t = brightness.clamp(0.0, 1.0);
        let span = self.span() as f64;
        let d = match polarity {
            DepthPolarity::NearBright => self.max as f64 - t * span,
            DepthPolarity::NearDark => self.min as f64 + t * span,
        };
        (d.round() as u32).clamp(self.min, self.max)
    }
}

impl Default for DepthRange {
    fn default() -> Self {
        Self { min: 60, max: 180 }
    }
}

/// One depth value per pixel, indexed `[[y, x]]`
#[derive(Clone, Debug, PartialEq)]
pub struct DepthSurface {
    data: Array2<u32>,
}

impl DepthSurface {
    pub fn from_array(data: Array2<u32>) -> Self {
        Self { data }
    }

    pub fn filled(width: u32, height: u32, depth: u32) -> Self {
        Self { data: Array2::from_elem((height as usize, width as usize), depth) }
    }

    pub fn width(&self) -> u32 {
        self.data.ncols() as u32
    }

    pub fn height(&self) -> u32 {
        self.data.nrows() as u32
    }

    #[inline]
    pub fn get(&self, x: u32, y: u32) -> u32 {
        self.data[[y as usize, x as usize]]
    }

    pub fn as_array(&self) -> &Array2<u32> {
        &self.data
    }

    pub fn min_max(&self) -> Option<(u32, u32)> {
        let mut it = self.data.iter().copied();
        let first = it.next()?;
        Some(it.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v))))
    }
}

pub trait DepthEstimator {
    fn estimate(&self, image: &RgbaImage) -> Result<DepthSurface, ImageDecodeError>;
}

/// Grayscale luminance linearly rescaled into a depth range
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LuminanceDepth {
    pub range: DepthRange,
    pub polarity: DepthPolarity,
    /// Gaussian blur applied to luminance first. Dimensions are unchanged.
    pub blur_sigma: Option<f32>,
}

impl LuminanceDepth {
    pub fn new(range: DepthRange, polarity: DepthPolarity) -> Self {
        Self { range, polarity, blur_sigma: None }
    }

    pub fn with_blur(mut self, sigma: f32) -> Self {
        self.blur_sigma = Some(sigma);
        self
    }
}

impl DepthEstimator for LuminanceDepth {
    fn estimate(&self, image: &RgbaImage) -> Result<DepthSurface, ImageDecodeError> {
        let (w, h) = image.dimensions();
        ensure_area(w, h)?;

        let mut gray = luminance_image(image);
        if let Some(sigma) = self.blur_sigma.filter(|s| *s > 0.0) {
            gray = image::imageops::blur(&gray, sigma);
        }

        let data = Array2::from_shape_fn((h as usize, w as usize), |(y, x)| {
            let l = gray.get_pixel(x as u32, y as u32)[0];
            self.range.map(l as f64 / 255.0, self.polarity)
        });
        Ok(DepthSurface { data })
    }
}

pub fn luminance_image(image: &RgbaImage) -> GrayImage {
    let (w, h) = image.dimensions();
    GrayImage::from_fn(w, h, |x, y| Luma([Rgb::from(*image.get_pixel(x, y)).luminance()]))
}

pub(crate) fn ensure_area(width: u32, height: u32) -> Result<(), ImageDecodeError> {
    if width == 0 || height == 0 {
        return Err(ImageDecodeError::ZeroArea { width, height });
    }
    Ok(())
}
