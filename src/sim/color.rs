//! Seeded terrain tint colors

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

/// Lowest value of each tint channel
const CHANNEL_MIN: u8 = 20;
/// Exclusive upper bound of each tint channel
const CHANNEL_MAX: u8 = 70;

/// Opaque RGB tint applied on top of a cell's terrain artwork
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Packed `0xAARRGGBB` with full alpha
    pub fn to_argb(self) -> u32 {
        0xFF00_0000 | (self.r as u32) << 16 | (self.g as u32) << 8 | self.b as u32
    }
}

/// Derives dark, muted tints deterministically from a seed.
pub struct ColorGenerator;

impl ColorGenerator {
    /// Same seed, same color. Each channel lands in `20..70`.
    pub fn tint(seed: u64) -> Rgb {
        let mut rng = Pcg32::seed_from_u64(seed);
        let r = rng.random_range(CHANNEL_MIN..CHANNEL_MAX);
        let g = rng.random_range(CHANNEL_MIN..CHANNEL_MAX);
        let b = rng.random_range(CHANNEL_MIN..CHANNEL_MAX);
        Rgb::new(r, g, b)
    }
}
