// ============================================================================
// ANAMORPH ENGINE - Images to perspective block structures
// ============================================================================
//
// A source image becomes a cloud of blocks in front of the viewer. Each
// pixel is pushed out along the view direction by its estimated depth and
// spread sideways in proportion, so the structure only lines up into the
// picture from the pose it was built for.

pub mod catalog;
pub mod color;
pub mod config;
pub mod depth;
pub mod error;
pub mod gateway;
pub mod geometry;
pub mod image_source;
pub mod pipeline;
pub mod synth;

pub use catalog::{ColorCatalog, MaterialId};
pub use color::Rgb;
pub use config::Config;
pub use depth::{DepthEstimator, DepthPolarity, DepthRange, DepthSurface, LuminanceDepth};
pub use error::{CatalogLoadError, ConfigError, GatewayError, ImageDecodeError, PipelineError, PoseUnavailableError};
pub use gateway::{CommandSink, DispatchReport, PoseProvider};
pub use geometry::{BlockPos, Projector, Vec3, ViewFrame, ViewerPose};
pub use pipeline::{Pipeline, Plan, RunReport};
pub use synth::{PlacementInstruction, SynthesisOptions, synthesize};
