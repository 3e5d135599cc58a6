//! Tilt Runner - a vertically scrolling tilt-to-steer runner
//!
//! Core modules:
//! - `sim`: World simulation (ship, terrain cells, paging, collisions)
//! - `renderer`: Frame snapshots and backend-neutral draw calls
//! - `game_loop`: Fixed-tick driver thread with pause/resume/stop
//! - `platform`: Tilt input adapters
//! - `artwork`: Terrain bitmap sources
//! - `persistence`: High score storage
//! - `settings`: JSON configuration

pub mod artwork;
pub mod game_loop;
pub mod highscores;
pub mod persistence;
pub mod platform;
pub mod renderer;
pub mod settings;
pub mod sim;

pub use artwork::{ArtworkSource, DirectoryArtwork, MemoryArtwork, TerrainLoadError};
pub use game_loop::{GameLoop, LoopConfig, LoopError, LoopHandle, LoopStats};
pub use highscores::HighScores;
pub use persistence::{JsonFileStore, MemoryScoreStore, ScoreStore};
pub use settings::Settings;
pub use sim::{GameEvent, TickOutcome, World, WorldError};

/// Game configuration constants
pub mod consts {
    /// Logical screen the camera frames, in world pixels
    pub const GAME_WIDTH: i32 = 360;
    pub const GAME_HEIGHT: i32 = 640;

    /// Terrain cell dimensions (every artwork bitmap has this size)
    pub const CELL_WIDTH: u32 = 512;
    pub const CELL_HEIGHT: u32 = 1024;

    /// Simulation ticks per second
    pub const TARGET_TPS: u32 = 60;

    /// Ship defaults
    pub const SHIP_START_SPEED: f32 = 1.0;
    pub const SHIP_SPRITE_WIDTH: f32 = 21.0;
    pub const SHIP_SPRITE_HEIGHT: f32 = 24.0;

    /// Speed gained on entering every third cell
    pub const SPEED_BUMP: f32 = 0.5;
    pub const SPEED_BUMP_EVERY_CELLS: i32 = 3;

    /// Hold on the crash frame before restarting
    pub const CRASH_GRACE_MS: u64 = 2000;
    /// Longest wait for an entered cell's bitmap
    pub const CELL_LOAD_TIMEOUT_MS: u64 = 2000;
}
