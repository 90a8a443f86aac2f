// pipeline.rs - One image-to-structure run
//
//   1. Query viewer pose
//   2. Load image, resize to output size
//   3. Estimate depth
//   4. Project + match colors into placement instructions
//   5. Hand the sequence to the sink
//
// Any error before step 5 aborts with nothing dispatched.

use std::path::Path;

use image::DynamicImage;
use log::info;

use crate::catalog::ColorCatalog;
use crate::config::Config;
use crate::depth::{DepthEstimator, LuminanceDepth};
use crate::error::PipelineError;
use crate::gateway::{CommandSink, DispatchReport, PoseProvider};
use crate::geometry::{Projector, ViewerPose};
use crate::image_source::{self, OutputSize};
use crate::synth::{self, Synthesis, SynthesisOptions, SynthesisReport};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RunReport {
    pub pose: ViewerPose,
    pub width: u32,
    pub height: u32,
    pub synthesis: SynthesisReport,
    pub dispatch: DispatchReport,
}

/// Instructions computed for a pose, ready to dispatch
#[derive(Clone, Debug)]
pub struct Plan {
    pub pose: ViewerPose,
    pub width: u32,
    pub height: u32,
    pub synthesis: Synthesis,
}

pub struct Pipeline<'a> {
    catalog: &'a ColorCatalog,
    estimator: Box<dyn DepthEstimator + 'a>,
    size: Option<OutputSize>,
    scale: f64,
    reference_depth: Option<f64>,
    options: SynthesisOptions,
}

impl<'a> Pipeline<'a> {
    /// No resizing, unit scale, no perspective scaling, default options
    pub fn new(catalog: &'a ColorCatalog, estimator: impl DepthEstimator + 'a) -> Self {
        Self {
            catalog,
            estimator: Box::new(estimator),
            size: None,
            scale: 1.0,
            reference_depth: None,
            options: SynthesisOptions::default(),
        }
    }

    pub fn from_config(catalog: &'a ColorCatalog, config: &Config) -> Self {
        let luminance = LuminanceDepth {
            range: config.depth_range,
            polarity: config.depth_polarity,
            blur_sigma: config.blur_sigma,
        };
        let estimator: Box<dyn DepthEstimator + 'a> = match &config.depth_model {
            #[cfg(feature = "midas")]
            Some(model) => Box::new(crate::depth::MidasDepth::new(model, config.depth_range, config.depth_polarity)),
            #[cfg(not(feature = "midas"))]
            Some(model) => {
                log::warn!("depth model {} ignored: built without the `midas` feature", model.display());
                Box::new(luminance)
            }
            None => Box::new(luminance),
        };

        Self {
            catalog,
            estimator,
            size: Some(config.output_size()),
            scale: config.image_scale,
            reference_depth: config.reference_depth(),
            options: config.synthesis_options(),
        }
    }

    pub fn with_output_size(mut self, size: OutputSize) -> Self {
        self.size = Some(size);
        self
    }

    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_reference_depth(mut self, depth: f64) -> Self {
        self.reference_depth = Some(depth);
        self
    }

    pub fn with_options(mut self, options: SynthesisOptions) -> Self {
        self.options = options;
        self
    }

    /// Steps 2-4 for an already-decoded image
    pub fn plan(&self, pose: ViewerPose, image: DynamicImage) -> Result<Plan, PipelineError> {
        let rgba = image_source::prepare(image, self.size)?;
        let (width, height) = rgba.dimensions();
        info!("image {width}x{height}");

        let depth = self.estimator.estimate(&rgba)?;
        if let Some((lo, hi)) = depth.min_max() {
            info!("depth surface spans {lo}..={hi}");
        }

        let mut projector = Projector::new(&pose, width, height, self.scale);
        if let Some(reference) = self.reference_depth {
            projector = projector.with_reference_depth(reference);
        }

        let synthesis = synth::synthesize(&rgba, &depth, self.catalog, &projector, &self.options)?;
        info!(
            "generated {} instructions ({} transparent, {} duplicate cells dropped)",
            synthesis.report.emitted, synthesis.report.transparent, synthesis.report.duplicates
        );
        Ok(Plan { pose, width, height, synthesis })
    }

    /// Full run from an image file
    pub fn run(
        &self,
        poses: &mut dyn PoseProvider,
        image_path: &Path,
        sink: &mut dyn CommandSink,
    ) -> Result<RunReport, PipelineError> {
        let pose = poses.viewer_pose()?;
        info!(
            "viewer at ({:.2}, {:.2}, {:.2}) yaw {:.1} pitch {:.1}",
            pose.position.x, pose.position.y, pose.position.z, pose.yaw, pose.pitch
        );

        let image = image_source::decode_file(image_path)?;
        let plan = self.plan(pose, image)?;
        let dispatch = sink.dispatch(&plan.synthesis.instructions)?;

        Ok(RunReport {
            pose,
            width: plan.width,
            height: plan.height,
            synthesis: plan.synthesis.report,
            dispatch,
        })
    }
}
