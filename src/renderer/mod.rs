//! Rendering front end
//!
//! Turns a [`FrameSnapshot`] into a list of [`DrawCall`]s for whatever
//! backend implements [`Canvas`].

pub mod draw;
pub mod frame;

pub use draw::{Canvas, DrawCall, TerrainBlit, build_draw_calls, render_frame, terrain_blit};
pub use frame::{CellView, FrameSlot, FrameSnapshot, ShipPose};
