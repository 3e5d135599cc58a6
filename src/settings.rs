//! Runtime settings
//!
//! Read from a JSON file next to the binary. Every field has a default, so
//! a partial file (or no file at all) is fine.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::consts::{CELL_LOAD_TIMEOUT_MS, CRASH_GRACE_MS, GAME_HEIGHT, GAME_WIDTH, TARGET_TPS};
use crate::game_loop::LoopConfig;
use crate::persistence::write_text_atomic;
use crate::sim::{CameraConfig, SeedPolicy, WorldConfig};

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("could not access settings file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid settings file {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Simulation ticks per second
    pub tick_rate_hz: u32,
    pub crash_grace_ms: u64,
    pub cell_load_timeout_ms: u64,

    // === Display ===
    pub screen_width: u32,
    pub screen_height: u32,

    // === Files ===
    /// Directory holding `start.png` and the terrain pool
    pub artwork_dir: PathBuf,
    pub score_file: PathBuf,

    /// Fixed seed basis; reseeded from the clock every run when unset
    pub seed: Option<u64>,

    /// How long the headless binary plays before stopping
    pub demo_seconds: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            tick_rate_hz: TARGET_TPS,
            crash_grace_ms: CRASH_GRACE_MS,
            cell_load_timeout_ms: CELL_LOAD_TIMEOUT_MS,

            screen_width: GAME_WIDTH as u32,
            screen_height: GAME_HEIGHT as u32,

            artwork_dir: PathBuf::from("artwork"),
            score_file: PathBuf::from("highscores.json"),

            seed: None,

            demo_seconds: 30,
        }
    }
}

impl Settings {
    /// Load settings from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(source) if source.kind() == io::ErrorKind::NotFound => {
                log::info!("No settings at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(SettingsError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        let settings = serde_json::from_str(&text).map_err(|source| SettingsError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        log::info!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        let json = serde_json::to_string_pretty(self).map_err(|source| SettingsError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        write_text_atomic(path, &json).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        log::info!("Settings saved to {}", path.display());
        Ok(())
    }

    /// Time per tick; a zero rate falls back to the default
    pub fn tick_interval(&self) -> Duration {
        let hz = if self.tick_rate_hz == 0 {
            TARGET_TPS
        } else {
            self.tick_rate_hz
        };
        Duration::from_secs_f64(1.0 / hz as f64)
    }

    pub fn crash_grace(&self) -> Duration {
        Duration::from_millis(self.crash_grace_ms)
    }

    pub fn load_timeout(&self) -> Duration {
        Duration::from_millis(self.cell_load_timeout_ms)
    }

    pub fn camera(&self) -> CameraConfig {
        CameraConfig::for_screen(self.screen_width, self.screen_height)
    }

    pub fn seed_policy(&self) -> SeedPolicy {
        self.seed.map_or(SeedPolicy::Clock, SeedPolicy::Fixed)
    }

    pub fn world_config(&self) -> WorldConfig {
        WorldConfig {
            load_timeout: self.load_timeout(),
            seed: self.seed_policy(),
        }
    }

    pub fn loop_config(&self) -> LoopConfig {
        LoopConfig {
            tick_interval: self.tick_interval(),
            crash_grace: self.crash_grace(),
        }
    }
}
