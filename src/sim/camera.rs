//! Camera view rectangle and screen scaling
//!
//! The camera always frames a `GAME_WIDTH` x `GAME_HEIGHT` slice of the
//! world centered on the ship. `CameraConfig` maps that logical area onto
//! the physical screen and is passed explicitly to every draw call.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::consts::{GAME_HEIGHT, GAME_WIDTH};

/// Integer rectangle, right/bottom exclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IntRect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl IntRect {
    pub const fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Rectangle at the origin with the given size
    pub const fn sized(width: i32, height: i32) -> Self {
        Self::new(0, 0, width, height)
    }

    #[inline]
    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    #[inline]
    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }

    pub fn is_empty(&self) -> bool {
        self.left >= self.right || self.top >= self.bottom
    }

    /// Shift by `(dx, dy)`
    pub fn translate(&self, dx: i32, dy: i32) -> Self {
        Self::new(self.left + dx, self.top + dy, self.right + dx, self.bottom + dy)
    }

    /// Overlapping area, `None` when the rectangles don't overlap
    pub fn intersect(&self, other: &IntRect) -> Option<IntRect> {
        let rect = IntRect::new(
            self.left.max(other.left),
            self.top.max(other.top),
            self.right.min(other.right),
            self.bottom.min(other.bottom),
        );
        (!rect.is_empty()).then_some(rect)
    }

    /// Vertical overlap only (used for paging along the travel axis)
    pub fn overlaps_rows(&self, top: i32, bottom: i32) -> bool {
        self.top < bottom && top < self.bottom
    }
}

/// Screen dimensions and logical-to-screen scale
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraConfig {
    pub screen_width: u32,
    pub screen_height: u32,
    pub scale_x: f32,
    pub scale_y: f32,
}

impl CameraConfig {
    /// Scale factors follow from the screen size vs. the logical game size
    pub fn for_screen(screen_width: u32, screen_height: u32) -> Self {
        Self {
            screen_width,
            screen_height,
            scale_x: screen_width as f32 / GAME_WIDTH as f32,
            scale_y: screen_height as f32 / GAME_HEIGHT as f32,
        }
    }

    /// Screen center, where the ship is always drawn
    pub fn screen_center(&self) -> Vec2 {
        Vec2::new(self.screen_width as f32, self.screen_height as f32) / 2.0
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self::for_screen(GAME_WIDTH as u32, GAME_HEIGHT as u32)
    }
}

/// World-space rectangle seen by the camera, centered on `focus`
pub fn view_rect(focus: Vec2) -> IntRect {
    let x = focus.x as i32;
    let y = focus.y as i32;
    IntRect::new(
        x - GAME_WIDTH / 2,
        y - GAME_HEIGHT / 2,
        x + GAME_WIDTH / 2,
        y + GAME_HEIGHT / 2,
    )
}
