// color.rs - RGB triples and the distance/luminance math on them
//
// Integer arithmetic throughout so nearest-color lookups are exact and
// ties are decided by catalog order alone.

use image::Rgba;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Squared Euclidean distance in RGB space
    pub fn dist_sq(self, other: Rgb) -> u32 {
        let dr = self.r as i32 - other.r as i32;
        let dg = self.g as i32 - other.g as i32;
        let db = self.b as i32 - other.b as i32;
        (dr * dr + dg * dg + db * db) as u32
    }

    /// ITU-R 601 luma, rounded to nearest (0-255)
    pub fn luminance(self) -> u8 {
        let weighted = 299 * self.r as u32 + 587 * self.g as u32 + 114 * self.b as u32;
        ((weighted + 500) / 1000) as u8
    }
}

impl From<Rgba<u8>> for Rgb {
    fn from(p: Rgba<u8>) -> Self {
        Self::new(p[0], p[1], p[2])
    }
}

impl From<[u8; 3]> for Rgb {
    fn from(c: [u8; 3]) -> Self {
        Self::new(c[0], c[1], c[2])
    }
}
