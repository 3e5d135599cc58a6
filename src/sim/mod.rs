//! World simulation
//!
//! Everything that happens on the game-loop thread: ship motion, terrain
//! cells and their background loading, collisions, crash handling. No
//! drawing happens here; the world only publishes snapshots.

pub mod camera;
pub mod cell;
pub mod color;
pub mod events;
pub mod ship;
pub mod vector;
pub mod world;

pub use camera::{CameraConfig, IntRect, view_rect};
pub use cell::{LoadStatus, WorldCell, cell_number_at, cell_origin};
pub use color::{ColorGenerator, Rgb};
pub use events::{EventBus, GameEvent, GameEventListener, ListenerId};
pub use ship::{CollisionField, HULL_POINTS, Spaceship};
pub use world::{
    STARTING_POSITION, SeedPolicy, TickOutcome, World, WorldConfig, WorldError, WorldPhase,
};
