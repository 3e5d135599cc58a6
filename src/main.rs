//! Tilt Runner entry point
//!
//! Headless run: loads settings and artwork, flies the ship straight ahead
//! for `demo_seconds`, then prints the high score table.
//!
//! Usage: `tilt-runner [settings.json]`

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tilt_runner::game_loop::{GameLoop, RedrawSink};
use tilt_runner::platform::SharedTilt;
use tilt_runner::renderer::{Canvas, DrawCall, FrameSnapshot, render_frame};
use tilt_runner::sim::{CameraConfig, GameEvent, World};
use tilt_runner::{DirectoryArtwork, HighScores, JsonFileStore, ScoreStore, Settings};

const DEFAULT_SETTINGS_FILE: &str = "tilt-runner.json";

/// Counts what a real backend would have drawn
#[derive(Debug, Default)]
struct HeadlessCanvas {
    frames: u64,
    terrain_blits: u64,
    hud: Vec<String>,
}

impl Canvas for HeadlessCanvas {
    fn draw(&mut self, call: &DrawCall) {
        match call {
            DrawCall::Clear => {
                self.frames += 1;
                self.hud.clear();
            }
            DrawCall::Terrain { .. } => self.terrain_blits += 1,
            DrawCall::Ship { .. } => {}
            DrawCall::Text { text, .. } => self.hud.push(text.clone()),
        }
    }
}

struct HeadlessDisplay {
    camera: CameraConfig,
    canvas: HeadlessCanvas,
}

impl RedrawSink for HeadlessDisplay {
    fn request_redraw(&mut self, frame: &Arc<FrameSnapshot>) {
        render_frame(frame, &self.camera, &mut self.canvas);
        if self.canvas.frames % 600 == 0 {
            log::debug!(
                "{} frames, {} terrain blits, HUD {:?}",
                self.canvas.frames,
                self.canvas.terrain_blits,
                self.canvas.hud
            );
        }
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let settings_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SETTINGS_FILE));
    let settings = Settings::load(&settings_path)?;

    let artwork = Arc::new(DirectoryArtwork::open(&settings.artwork_dir)?);
    let scores = Arc::new(JsonFileStore::new(&settings.score_file));

    let mut world = World::new(artwork, scores.clone(), settings.world_config());
    world.subscribe(|event: GameEvent| match event {
        GameEvent::GameStarted => log::info!("Game started"),
        GameEvent::SpaceshipCrash => log::info!("Spaceship crashed"),
    });

    // No sensor here: hold the device tilted fully forward
    let tilt = SharedTilt::new();
    tilt.set_from_accelerometer(0.0, 1.0);

    let display = HeadlessDisplay {
        camera: settings.camera(),
        canvas: HeadlessCanvas::default(),
    };
    let game = GameLoop::new(
        world,
        Box::new(Arc::clone(&tilt)),
        Box::new(display),
        settings.loop_config(),
    );

    let handle = game.spawn()?;
    std::thread::sleep(Duration::from_secs(settings.demo_seconds));
    if let Some(frame) = handle.latest_frame() {
        log::info!(
            "Last frame: tick {}, score {}, speed {:.1}",
            frame.tick,
            frame.score,
            frame.speed
        );
    }
    let stats = handle.stop()?;
    log::info!(
        "Played {} ticks, {} crashes, {} restarts",
        stats.ticks,
        stats.crashes,
        stats.restarts
    );

    let table = HighScores::from_scores(scores.load()?);
    println!("High scores:");
    for (rank, score) in table.scores().iter().enumerate() {
        println!("{:>3}. {}", rank + 1, score);
    }
    Ok(())
}

fn main() {
    env_logger::init();
    log::info!("Tilt Runner starting...");

    if let Err(error) = run() {
        log::error!("{}", error);
        eprintln!("tilt-runner: {error}");
        std::process::exit(1);
    }
}
