// gateway/ - Boundary to the game server
//
// The pipeline only sees the PoseProvider and CommandSink traits. RCON is
// one implementation; tests and dry runs use the in-process ones here.

pub mod pool;
pub mod rcon;

use std::io::Write;

use log::debug;

use crate::config::DEFAULT_EYE_HEIGHT;
use crate::error::{GatewayError, PoseUnavailableError};
use crate::geometry::{Vec3, ViewerPose};
use crate::synth::PlacementInstruction;

/// Source of the viewer pose, queried once per run
pub trait PoseProvider {
    fn viewer_pose(&mut self) -> Result<ViewerPose, PoseUnavailableError>;
}

/// Executes placement instructions against a world. Each instruction
/// succeeds or fails on its own; order may be relaxed.
pub trait CommandSink {
    fn dispatch(&mut self, instructions: &[PlacementInstruction]) -> Result<DispatchReport, GatewayError>;
}

/// A request/response text command channel (one RCON connection)
pub trait CommandChannel {
    fn command(&mut self, command: &str) -> Result<String, GatewayError>;
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub sent: usize,
    pub failed: usize,
}

/// Pose known ahead of time
#[derive(Clone, Copy, Debug)]
pub struct FixedPose(pub ViewerPose);

impl PoseProvider for FixedPose {
    fn viewer_pose(&mut self) -> Result<ViewerPose, PoseUnavailableError> {
        Ok(self.0)
    }
}

/// Reads a player's position and rotation with `data get entity`
pub struct EntityPoseQuery<C> {
    channel: C,
    player: String,
    eye_height: f64,
}

impl<C: CommandChannel> EntityPoseQuery<C> {
    pub fn new(channel: C, player: impl Into<String>) -> Self {
        Self { channel, player: player.into(), eye_height: DEFAULT_EYE_HEIGHT }
    }

    pub fn with_eye_height(mut self, eye_height: f64) -> Self {
        self.eye_height = eye_height;
        self
    }

    fn query(&mut self, path: &str) -> Result<String, PoseUnavailableError> {
        let cmd = format!("data get entity {} {path}", self.player);
        self.channel.command(&cmd).map_err(|e| PoseUnavailableError::Query(e.to_string()))
    }
}

impl<C: CommandChannel> PoseProvider for EntityPoseQuery<C> {
    fn viewer_pose(&mut self) -> Result<ViewerPose, PoseUnavailableError> {
        let pos_reply = self.query("Pos")?;
        let rot_reply = self.query("Rotation")?;
        debug!("pose replies: {pos_reply:?} / {rot_reply:?}");

        let pos = match parse_list_response(&pos_reply).as_deref() {
            Some(&[x, y, z]) => Vec3::new(x, y + self.eye_height, z),
            _ => return Err(PoseUnavailableError::Parse { field: "Pos", response: pos_reply }),
        };
        let (yaw, pitch) = match parse_list_response(&rot_reply).as_deref() {
            Some(&[yaw, pitch]) => (yaw, pitch),
            _ => return Err(PoseUnavailableError::Parse { field: "Rotation", response: rot_reply }),
        };
        Ok(ViewerPose::new(pos, yaw, pitch))
    }
}

/// Numbers inside the first `[...]` of a reply such as
/// `Steve has the following entity data: [12.5d, 64.0d, -3.2d]`.
/// Non-numeric characters (type suffixes) are dropped per element.
pub fn parse_list_response(response: &str) -> Option<Vec<f64>> {
    let start = response.find('[')?;
    let len = response[start + 1..].find(']')?;
    let inner = &response[start + 1..start + 1 + len];
    if inner.trim().is_empty() {
        return None;
    }

    inner
        .split(',')
        .map(|part| {
            let cleaned: String = part
                .chars()
                .filter(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'e' | 'E'))
                .collect();
            cleaned.parse::<f64>().ok()
        })
        .collect()
}

/// Writes commands as text lines, one per instruction
pub struct WriterSink<W> {
    out: W,
}

impl<W: Write> WriterSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> CommandSink for WriterSink<W> {
    fn dispatch(&mut self, instructions: &[PlacementInstruction]) -> Result<DispatchReport, GatewayError> {
        for inst in instructions {
            writeln!(self.out, "{inst}")?;
        }
        self.out.flush()?;
        Ok(DispatchReport { sent: instructions.len(), failed: 0 })
    }
}
