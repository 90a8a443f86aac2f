// config.rs - Run configuration, loaded from a `.ron` file
//
// Every field is optional in the file; missing ones take the defaults
// below.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::depth::{DepthPolarity, DepthRange};
use crate::error::ConfigError;
use crate::image_source::OutputSize;
use crate::synth::{DEFAULT_ALPHA_THRESHOLD, SynthesisOptions};

/// Standing eye height above the feet position reported by the server
pub const DEFAULT_EYE_HEIGHT: f64 = 1.62;

/// How equal-distance colors are resolved. Only one policy exists, and
/// `ColorCatalog::nearest_material` always applies it; the field is
/// accepted so config files can state it explicitly.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColorTieBreak {
    #[default]
    FirstInsertion,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RconConfig {
    pub host: String,
    pub port: u16,
    pub password: String,
    /// Concurrent connections used for dispatch
    pub pool_size: usize,
    pub timeout_ms: u64,
}

impl Default for RconConfig {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 25575,
            password: String::new(),
            pool_size: 16,
            timeout_ms: 5000,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Blocks per pixel at the far end of the depth range
    pub image_scale: f64,
    pub depth_range: DepthRange,
    pub depth_polarity: DepthPolarity,
    pub alpha_threshold: u8,
    pub color_tie_break: ColorTieBreak,
    pub output_width: u32,
    /// `None` keeps the source aspect ratio
    pub output_height: Option<u32>,
    /// Grow lateral offsets with depth so the image keeps its shape from the pose
    pub perspective: bool,
    /// Fraction of the depth range (farthest end) drawn with 2x2 blocks
    pub far_fill: Option<f64>,
    pub blur_sigma: Option<f32>,
    /// ONNX depth model; needs the `midas` feature
    pub depth_model: Option<PathBuf>,
    pub eye_height: f64,
    pub player: String,
    pub rcon: RconConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            image_scale: 1.0,
            depth_range: DepthRange::default(),
            depth_polarity: DepthPolarity::NearBright,
            alpha_threshold: DEFAULT_ALPHA_THRESHOLD,
            color_tie_break: ColorTieBreak::FirstInsertion,
            output_width: 400,
            output_height: None,
            perspective: true,
            far_fill: None,
            blur_sigma: None,
            depth_model: None,
            eye_height: DEFAULT_EYE_HEIGHT,
            player: String::new(),
            rcon: RconConfig::default(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Self::from_ron_str(&text)
    }

    pub fn from_ron_str(src: &str) -> Result<Self, ConfigError> {
        let config: Config = ron::from_str(src).map_err(|e| ConfigError::Ron(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.depth_range.validate()?;
        if !(self.image_scale.is_finite() && self.image_scale > 0.0) {
            return Err(ConfigError::InvalidScale(self.image_scale));
        }
        if let Some(f) = self.far_fill {
            if !(0.0..=1.0).contains(&f) {
                return Err(ConfigError::InvalidFarFill(f));
            }
        }
        Ok(())
    }

    pub fn output_size(&self) -> OutputSize {
        OutputSize { width: self.output_width, height: self.output_height }
    }

    pub fn synthesis_options(&self) -> SynthesisOptions {
        let opts = SynthesisOptions { alpha_threshold: self.alpha_threshold, far_fill_depth: None };
        match self.far_fill {
            Some(f) => opts.with_far_fill(self.depth_range, f),
            None => opts,
        }
    }

    /// Depth at which one pixel spans `image_scale` blocks
    pub fn reference_depth(&self) -> Option<f64> {
        self.perspective.then_some(self.depth_range.max as f64)
    }
}
