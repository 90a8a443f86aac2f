// synth.rs - Image + depth -> ordered placement instructions
//
// Raster scan, row-major. Pixels below the alpha threshold produce no
// block. Each world coordinate is emitted at most once; on collision the
// first pixel in raster order keeps the cell. Far-fill cells are emitted
// after every pixel's own cell, so they only take cells no pixel landed on.

use std::collections::HashSet;
use std::fmt;

use image::RgbaImage;
use log::debug;

use crate::catalog::{ColorCatalog, MaterialId};
use crate::color::Rgb;
use crate::depth::{DepthRange, DepthSurface};
use crate::error::SynthError;
use crate::geometry::{BlockPos, Projector};

/// Default alpha cutoff: anything under 50% opacity is skipped
pub const DEFAULT_ALPHA_THRESHOLD: u8 = 128;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PlacementInstruction {
    pub position: BlockPos,
    pub material: MaterialId,
}

impl PlacementInstruction {
    /// Server command form, without a leading slash
    pub fn to_command(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for PlacementInstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let p = self.position;
        write!(f, "setblock {} {} {} {}", p.x, p.y, p.z, self.material)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SynthesisOptions {
    /// Pixels with alpha strictly below this are skipped
    pub alpha_threshold: u8,
    /// Pixels at or beyond this depth also fill their right/up
    /// neighbours to close gaps between spread-out far blocks
    pub far_fill_depth: Option<u32>,
}

impl SynthesisOptions {
    /// Fill the farthest `fraction` of `range`
    pub fn with_far_fill(mut self, range: DepthRange, fraction: f64) -> Self {
        let f = fraction.clamp(0.0, 1.0);
        let from = range.min as f64 + (1.0 - f) * range.span() as f64;
        self.far_fill_depth = Some(from.round() as u32);
        self
    }
}

impl Default for SynthesisOptions {
    fn default() -> Self {
        Self { alpha_threshold: DEFAULT_ALPHA_THRESHOLD, far_fill_depth: None }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SynthesisReport {
    pub pixels: usize,
    pub transparent: usize,
    pub duplicates: usize,
    pub emitted: usize,
}

#[derive(Clone, Debug, Default)]
pub struct Synthesis {
    pub instructions: Vec<PlacementInstruction>,
    pub report: SynthesisReport,
}

struct Emitter {
    seen: HashSet<BlockPos>,
    out: Vec<PlacementInstruction>,
    duplicates: usize,
}

impl Emitter {
    fn emit(&mut self, position: BlockPos, material: &MaterialId) {
        if self.seen.insert(position) {
            self.out.push(PlacementInstruction { position, material: material.clone() });
        } else {
            self.duplicates += 1;
        }
    }
}

pub fn synthesize(
    image: &RgbaImage,
    depth: &DepthSurface,
    catalog: &ColorCatalog,
    projector: &Projector,
    options: &SynthesisOptions,
) -> Result<Synthesis, SynthError> {
    let (w, h) = image.dimensions();
    if (depth.width(), depth.height()) != (w, h) {
        return Err(SynthError::DimensionMismatch {
            image_w: w,
            image_h: h,
            depth_w: depth.width(),
            depth_h: depth.height(),
        });
    }

    let mut emitter = Emitter {
        seen: HashSet::with_capacity((w * h) as usize),
        out: Vec::with_capacity((w * h) as usize),
        duplicates: 0,
    };
    let mut transparent = 0;
    let mut fills: Vec<(BlockPos, &MaterialId)> = Vec::new();

    for y in 0..h {
        for x in 0..w {
            let px = image.get_pixel(x, y);
            if px[3] < options.alpha_threshold {
                transparent += 1;
                continue;
            }

            let material = catalog.nearest_material(Rgb::from(*px));
            let d = depth.get(x, y);
            let at = projector.project_exact(x, y, d as f64);
            emitter.emit(at.round(), material);

            if options.far_fill_depth.is_some_and(|from| d >= from) {
                let (step_r, step_u) = projector.pixel_steps(d as f64);
                fills.push(((at + step_r).round(), material));
                fills.push(((at + step_u).round(), material));
                fills.push(((at + step_r + step_u).round(), material));
            }
        }
    }

    for (position, material) in fills {
        emitter.emit(position, material);
    }

    let report = SynthesisReport {
        pixels: (w * h) as usize,
        transparent,
        duplicates: emitter.duplicates,
        emitted: emitter.out.len(),
    };
    debug!("synthesis: {report:?}");

    Ok(Synthesis { instructions: emitter.out, report })
}
