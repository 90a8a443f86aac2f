// geometry/ - World-space math for the projection
//
// Conventions follow the game: +Y is up, yaw 0 faces +Z, yaw 90 faces -X,
// positive pitch looks down. Angles are in degrees.

mod projector;

pub use projector::Projector;

use std::ops::{Add, Mul, Neg, Sub};

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// World vertical axis
pub const WORLD_UP: Vec3 = Vec3::new(0.0, 1.0, 0.0);

/// Reference "up" used when looking (almost) straight up or down
pub const POLE_UP: Vec3 = Vec3::new(1.0, 0.0, 0.0);

/// |forward . WORLD_UP| above this switches the reference to POLE_UP
const POLE_THRESHOLD: f64 = 0.99;

impl Vec3 {
    pub const ZERO: Vec3 = Vec3::new(0.0, 0.0, 0.0);

    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn dot(self, o: Vec3) -> f64 {
        self.x * o.x + self.y * o.y + self.z * o.z
    }

    pub fn cross(self, o: Vec3) -> Vec3 {
        Vec3::new(
            self.y * o.z - self.z * o.y,
            self.z * o.x - self.x * o.z,
            self.x * o.y - self.y * o.x,
        )
    }

    pub fn length(self) -> f64 {
        self.dot(self).sqrt()
    }

    /// Unit vector, or zero for a zero-length input
    pub fn normalize(self) -> Vec3 {
        let n = self.length();
        if n == 0.0 { Vec3::ZERO } else { self * (1.0 / n) }
    }

    pub fn round(self) -> BlockPos {
        BlockPos {
            x: self.x.round() as i32,
            y: self.y.round() as i32,
            z: self.z.round() as i32,
        }
    }
}

impl Add for Vec3 {
    type Output = Self;
    fn add(self, o: Self) -> Self {
        Self::new(self.x + o.x, self.y + o.y, self.z + o.z)
    }
}

impl Sub for Vec3 {
    type Output = Self;
    fn sub(self, o: Self) -> Self {
        Self::new(self.x - o.x, self.y - o.y, self.z - o.z)
    }
}

impl Mul<f64> for Vec3 {
    type Output = Self;
    fn mul(self, s: f64) -> Self {
        Self::new(self.x * s, self.y * s, self.z * s)
    }
}

impl Neg for Vec3 {
    type Output = Self;
    fn neg(self) -> Self {
        Self::new(-self.x, -self.y, -self.z)
    }
}

/// Integer cell address in the block grid
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockPos {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }
}

/// Where the viewer's eye is and where it looks. Captured once per run.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewerPose {
    pub position: Vec3,
    pub yaw: f64,
    pub pitch: f64,
}

impl ViewerPose {
    pub fn new(position: Vec3, yaw: f64, pitch: f64) -> Self {
        Self { position, yaw, pitch }
    }

    pub fn frame(&self) -> ViewFrame {
        ViewFrame::from_angles(self.yaw, self.pitch)
    }
}

/// Orthonormal basis attached to the viewer
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewFrame {
    pub forward: Vec3,
    pub right: Vec3,
    pub up: Vec3,
}

impl ViewFrame {
    pub fn from_angles(yaw_deg: f64, pitch_deg: f64) -> Self {
        let yaw = yaw_deg.rem_euclid(360.0).to_radians();
        let pitch = pitch_deg.clamp(-90.0, 90.0).to_radians();

        let forward = Vec3::new(-yaw.sin() * pitch.cos(), -pitch.sin(), yaw.cos() * pitch.cos()).normalize();

        let reference = if forward.dot(WORLD_UP).abs() > POLE_THRESHOLD { POLE_UP } else { WORLD_UP };
        let right = forward.cross(reference).normalize();
        let up = right.cross(forward).normalize();

        Self { forward, right, up }
    }
}
