//! Immutable per-tick frame snapshot
//!
//! The simulation thread builds one of these after every tick and swaps it
//! into a [`FrameSlot`]. The display side only ever reads snapshots, never
//! the live world.

use std::sync::{Arc, Mutex, PoisonError};

use glam::Vec2;

use crate::artwork::{ArtworkId, Size, TerrainBitmap};
use crate::sim::camera::IntRect;
use crate::sim::color::Rgb;
use crate::sim::world::WorldPhase;

/// One resident cell as the renderer sees it
#[derive(Debug, Clone)]
pub struct CellView {
    pub cell_number: i32,
    /// Top-left corner in world coordinates
    pub origin: Vec2,
    pub bounds: Size,
    pub tint: Rgb,
    pub artwork: ArtworkId,
    /// `None` while the cell is still loading
    pub bitmap: Option<TerrainBitmap>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShipPose {
    pub position: Vec2,
    pub rotation_degrees: f32,
}

#[derive(Debug, Clone)]
pub struct FrameSnapshot {
    /// Ticks simulated since the last restart
    pub tick: u64,
    pub phase: WorldPhase,
    /// Resident cells, ordered by ascending cell number
    pub cells: Vec<CellView>,
    pub ship: ShipPose,
    pub score: u32,
    pub speed: f32,
    /// World-space camera rectangle
    pub view: IntRect,
}

/// Single-writer / many-reader handoff of the latest frame.
#[derive(Debug, Default)]
pub struct FrameSlot {
    latest: Mutex<Option<Arc<FrameSnapshot>>>,
}

impl FrameSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the current frame. Readers holding the old one keep it.
    pub fn publish(&self, frame: Arc<FrameSnapshot>) {
        let mut latest = self.latest.lock().unwrap_or_else(PoisonError::into_inner);
        *latest = Some(frame);
    }

    /// Latest published frame, if any
    pub fn latest(&self) -> Option<Arc<FrameSnapshot>> {
        self.latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
