// projector.rs - Pixel + depth -> block coordinate
//
// A pixel's offset from the image center is laid out on the right/up
// axes and its depth along forward. With perspective scaling the lateral
// offset grows with depth so every pixel keeps the same angular size seen
// from the pose; that is what makes the structure resolve only from there.

use super::{BlockPos, Vec3, ViewFrame, ViewerPose};

#[derive(Clone, Copy, Debug)]
pub struct Projector {
    origin: Vec3,
    frame: ViewFrame,
    center_x: i64,
    center_y: i64,
    /// Blocks per pixel at `reference_depth`
    scale: f64,
    /// Depth at which one pixel spans `scale` blocks. `None` disables
    /// perspective scaling.
    reference_depth: Option<f64>,
}

impl Projector {
    pub fn new(pose: &ViewerPose, width: u32, height: u32, scale: f64) -> Self {
        Self {
            origin: pose.position,
            frame: pose.frame(),
            center_x: (width / 2) as i64,
            center_y: (height / 2) as i64,
            scale,
            reference_depth: None,
        }
    }

    /// Enable perspective scaling. Non-positive depths disable it.
    pub fn with_reference_depth(mut self, depth: f64) -> Self {
        self.reference_depth = (depth > 0.0).then_some(depth);
        self
    }

    pub fn frame(&self) -> &ViewFrame {
        &self.frame
    }

    /// Lateral growth factor for a pixel at `depth`
    #[inline]
    pub fn perspective_factor(&self, depth: f64) -> f64 {
        match self.reference_depth {
            Some(reference) => depth / reference,
            None => 1.0,
        }
    }

    /// Unrounded world position of pixel `(x, y)` at `depth`
    pub fn project_exact(&self, x: u32, y: u32, depth: f64) -> Vec3 {
        let k = self.scale * self.perspective_factor(depth);
        let h = (x as i64 - self.center_x) as f64 * k;
        let v = (self.center_y - y as i64) as f64 * k;

        self.origin + self.frame.forward * depth + self.frame.right * h + self.frame.up * v
    }

    pub fn project(&self, x: u32, y: u32, depth: f64) -> BlockPos {
        self.project_exact(x, y, depth).round()
    }

    /// One pixel step along right and up at `depth`, in world units
    pub fn pixel_steps(&self, depth: f64) -> (Vec3, Vec3) {
        let k = self.scale * self.perspective_factor(depth);
        (self.frame.right * k, self.frame.up * k)
    }
}
