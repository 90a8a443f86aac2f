// error.rs - Error taxonomy
//
// Catalog, image and pose errors are fatal for a run. Gateway errors only
// come from the RCON side and never from the core pipeline math.

use std::io;

#[derive(thiserror::Error, Debug)]
pub enum CatalogLoadError {
    #[error("I/O while reading color catalog: {0}")]
    Io(#[from] io::Error),
    #[error("JSON parse error in color catalog: {0}")]
    Json(String),
    #[error("color catalog has no entries")]
    Empty,
    #[error("material '{material}' must map to exactly three integers")]
    InvalidEntry { material: String },
    #[error("material '{material}' has channel value {value} outside 0..=255")]
    ChannelOutOfRange { material: String, value: i64 },
    #[error("duplicate material '{material}' in color catalog")]
    DuplicateMaterial { material: String },
}

#[derive(thiserror::Error, Debug)]
pub enum ImageDecodeError {
    #[error("I/O while reading image: {0}")]
    Io(#[from] io::Error),
    #[error("could not decode image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("image has zero area ({width}x{height})")]
    ZeroArea { width: u32, height: u32 },
}

#[derive(thiserror::Error, Debug)]
pub enum PoseUnavailableError {
    #[error("viewer pose query failed: {0}")]
    Query(String),
    #[error("could not parse {field} from response '{response}'")]
    Parse { field: &'static str, response: String },
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("I/O while reading config: {0}")]
    Io(#[from] io::Error),
    #[error("RON parse error in config: {0}")]
    Ron(String),
    #[error("depth range min {min} exceeds max {max}")]
    InvalidDepthRange { min: u32, max: u32 },
    #[error("image scale must be positive and finite, got {0}")]
    InvalidScale(f64),
    #[error("far fill fraction must be within 0..=1, got {0}")]
    InvalidFarFill(f64),
}

#[derive(thiserror::Error, Debug)]
pub enum SynthError {
    #[error("depth surface is {depth_w}x{depth_h} but image is {image_w}x{image_h}")]
    DimensionMismatch {
        image_w: u32,
        image_h: u32,
        depth_w: u32,
        depth_h: u32,
    },
}

#[derive(thiserror::Error, Debug)]
pub enum GatewayError {
    #[error("RCON I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("RCON authentication rejected by server")]
    AuthFailed,
    #[error("RCON command of {len} bytes exceeds the {max} byte limit")]
    PacketTooLarge { len: usize, max: usize },
    #[error("RCON protocol error: {0}")]
    Protocol(String),
    #[error("RCON reply id {got} does not match request {expected}")]
    ReplyMismatch { expected: i32, got: i32 },
    #[error("could not build dispatch thread pool: {0}")]
    ThreadPool(String),
}

impl GatewayError {
    /// The stream is broken or out of sync and must not be reused
    pub fn is_connection_fault(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Protocol(_) | Self::ReplyMismatch { .. })
    }
}

/// Any failure that aborts a whole run. No instructions are emitted.
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Catalog(#[from] CatalogLoadError),
    #[error(transparent)]
    Image(#[from] ImageDecodeError),
    #[error(transparent)]
    Pose(#[from] PoseUnavailableError),
    #[error(transparent)]
    Synth(#[from] SynthError),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}
