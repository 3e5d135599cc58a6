//! The player's spaceship
//!
//! Plain data plus movement/collision behavior. Drawing goes through the
//! frame snapshot, the ship itself knows nothing about rendering.

use glam::{Affine2, Vec2};
use serde::{Deserialize, Serialize};

use super::vector::{FORWARD, angle_between};
use crate::consts::{SHIP_SPRITE_HEIGHT, SHIP_SPRITE_WIDTH, SHIP_START_SPEED};

/// Hull sample points in sprite pixel space, traced from the sprite's
/// silhouette: nose (two pixels) and the two wing tips.
pub const HULL_POINTS: [Vec2; 4] = [
    Vec2::new(10.0, 2.0),
    Vec2::new(11.0, 2.0),
    Vec2::new(3.0, 22.0),
    Vec2::new(18.0, 22.0),
];

/// Anything that can answer "is there terrain at this world position?"
pub trait CollisionField {
    fn check_collision(&self, world_position: Vec2) -> bool;
}

/// Score earned for reaching `position` from `start`: forward (negative Y)
/// progress in whole pixels, never negative.
pub fn score_for(position: Vec2, start: Vec2) -> u32 {
    (start.y - position.y).max(0.0) as u32
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Spaceship {
    /// Center of the ship in world coordinates
    pub position: Vec2,
    /// Unit heading, starts pointing forward
    pub heading: Vec2,
    speed: f32,
    score: u32,
    start: Vec2,
}

impl Spaceship {
    pub fn new(start: Vec2) -> Self {
        Self {
            position: start,
            heading: FORWARD,
            speed: SHIP_START_SPEED,
            score: 0,
            start,
        }
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn start(&self) -> Vec2 {
        self.start
    }

    /// Add `delta` to the speed, never going below zero
    pub fn bump_speed(&mut self, delta: f32) {
        self.speed = (self.speed + delta).max(0.0);
    }

    /// Immobilize the ship (after a crash)
    pub fn stop(&mut self) {
        self.speed = 0.0;
    }

    /// Head along `direction` (already normalized) and travel one tick.
    ///
    /// A zero direction means no input: the ship keeps its previous
    /// heading and stays put.
    pub fn advance(&mut self, direction: Vec2) {
        if direction == Vec2::ZERO {
            return;
        }
        self.heading = direction;
        self.position += self.heading * self.speed;
    }

    /// Recompute the score from the current position. Never decreases.
    pub fn update_score(&mut self) {
        self.score = self.score.max(score_for(self.position, self.start));
    }

    /// Heading as clockwise degrees from forward; left turns are negative.
    pub fn rotation_degrees(&self) -> f32 {
        let degrees = angle_between(self.heading, FORWARD).to_degrees();
        if self.heading.x < 0.0 { -degrees } else { degrees }
    }

    /// Hull sample points in world coordinates
    pub fn hull_points(&self) -> [Vec2; 4] {
        let half = Vec2::new(SHIP_SPRITE_WIDTH, SHIP_SPRITE_HEIGHT) / 2.0;
        let transform = Affine2::from_translation(self.position)
            * Affine2::from_angle(self.rotation_degrees().to_radians())
            * Affine2::from_translation(-half);
        HULL_POINTS.map(|p| transform.transform_point2(p))
    }

    /// Whether any hull sample point touches terrain.
    ///
    /// Four samples, not the full silhouette: thin terrain can slip
    /// between them.
    pub fn collision_probe(&self, field: &impl CollisionField) -> bool {
        self.hull_points()
            .into_iter()
            .any(|p| field.check_collision(p))
    }
}
