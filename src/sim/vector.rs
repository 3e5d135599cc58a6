//! 2D vector helpers on top of `glam::Vec2`
//!
//! `Vec2` already covers add/scale/dot/length. The two helpers here carry
//! the game's own semantics: a per-axis normalize that leaves zero axes
//! untouched, and an unsigned angle between two headings.

use glam::Vec2;

/// World-space vector type used throughout the simulation.
pub type Vector2 = Vec2;

/// Canonical "forward" heading (toward negative Y, up the screen).
pub const FORWARD: Vec2 = Vec2::new(0.0, -1.0);

/// Normalize `v`, dividing only the non-zero components by its length.
///
/// A zero-length input comes back unchanged instead of producing NaN, and
/// an axis that was exactly 0 stays exactly 0.
#[inline]
pub fn normalize_axes(v: Vec2) -> Vec2 {
    let length = v.length();
    let x = if v.x != 0.0 { v.x / length } else { v.x };
    let y = if v.y != 0.0 { v.y / length } else { v.y };
    Vec2::new(x, y)
}

/// Angle in radians between `a` and `b`, in `[0, π]`.
#[inline]
pub fn angle_between(a: Vec2, b: Vec2) -> f32 {
    let dot = normalize_axes(a).dot(normalize_axes(b));
    // Rounding can push the dot product a hair outside acos' domain
    dot.clamp(-1.0, 1.0).acos()
}
