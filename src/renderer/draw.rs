//! Backend-agnostic draw calls
//!
//! `build_draw_calls` turns a [`FrameSnapshot`] into a flat list of
//! [`DrawCall`]s; any backend implementing [`Canvas`] can consume them.

use glam::Vec2;

use super::frame::FrameSnapshot;
use crate::artwork::{Size, TerrainBitmap};
use crate::sim::camera::{CameraConfig, IntRect};
use crate::sim::color::Rgb;

#[derive(Debug, Clone)]
pub enum DrawCall {
    /// Fill the whole screen with black
    Clear,
    /// Blit `src` (cell-local pixels) of a cell bitmap into `dst` (screen pixels)
    Terrain {
        cell_number: i32,
        src: IntRect,
        dst: IntRect,
        tint: Rgb,
        bitmap: TerrainBitmap,
    },
    /// Ship sprite centered at `center` (screen pixels)
    Ship {
        center: Vec2,
        rotation_degrees: f32,
        scale: Vec2,
    },
    /// HUD text with its baseline origin at `(x, y)` (screen pixels)
    Text { text: String, x: f32, y: f32 },
}

/// A rendering backend
pub trait Canvas {
    fn draw(&mut self, call: &DrawCall);
}

/// Source/destination rectangles for one terrain blit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerrainBlit {
    pub src: IntRect,
    pub dst: IntRect,
}

/// Portion of a cell visible through `view`, and where it lands on screen.
///
/// A cell cut off by the top (or left) of the view is anchored to the
/// bottom (or right) edge of the screen so partial cells never stretch.
pub fn terrain_blit(
    origin: Vec2,
    bounds: Size,
    view: IntRect,
    camera: &CameraConfig,
) -> Option<TerrainBlit> {
    let local = view.translate(-(origin.x as i32), -(origin.y as i32));
    let anchor_top = local.top >= 0;
    let anchor_left = local.left >= 0;

    let src = local.intersect(&IntRect::sized(bounds.width as i32, bounds.height as i32))?;

    let width = (src.width() as f32 * camera.scale_x) as i32;
    let height = (src.height() as f32 * camera.scale_y) as i32;
    let screen_w = camera.screen_width as i32;
    let screen_h = camera.screen_height as i32;

    let mut dst = IntRect::sized(width, height);
    if !anchor_top {
        dst.top = screen_h - height;
        dst.bottom = screen_h;
    }
    if !anchor_left {
        dst.left = screen_w - width;
        dst.right = screen_w;
    }

    Some(TerrainBlit { src, dst })
}

/// Everything needed to paint one frame, back to front
pub fn build_draw_calls(frame: &FrameSnapshot, camera: &CameraConfig) -> Vec<DrawCall> {
    let mut calls = Vec::with_capacity(frame.cells.len() + 4);
    calls.push(DrawCall::Clear);

    for cell in &frame.cells {
        let Some(bitmap) = &cell.bitmap else { continue };
        if let Some(blit) = terrain_blit(cell.origin, cell.bounds, frame.view, camera) {
            calls.push(DrawCall::Terrain {
                cell_number: cell.cell_number,
                src: blit.src,
                dst: blit.dst,
                tint: cell.tint,
                bitmap: bitmap.clone(),
            });
        }
    }

    calls.push(DrawCall::Ship {
        center: camera.screen_center(),
        rotation_degrees: frame.ship.rotation_degrees,
        scale: Vec2::new(camera.scale_x, camera.scale_y),
    });

    let w = camera.screen_width as f32;
    let h = camera.screen_height as f32;
    calls.push(DrawCall::Text {
        text: format!("Score: {}", frame.score),
        x: w * 0.10,
        y: h * 0.10,
    });
    calls.push(DrawCall::Text {
        text: format!("Speed: {:.1}", frame.speed),
        x: w * 0.70,
        y: h * 0.10,
    });

    calls
}

/// Build and submit a frame's draw calls to `canvas`
pub fn render_frame(frame: &FrameSnapshot, camera: &CameraConfig, canvas: &mut impl Canvas) {
    for call in build_draw_calls(frame, camera) {
        canvas.draw(&call);
    }
}
