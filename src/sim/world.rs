//! The game world: ship, resident cells, paging and crash detection
//!
//! Lifecycle: `Uninitialized -> Running -> Crashed -> Running (restart)`.
//!
//! Only a small window of cells is resident at a time. Steady state is the
//! ship's current cell plus the next cell in the direction of travel. When
//! the ship crosses into a new cell the next one is paged in on a loader
//! thread; the cell left behind stays resident while the camera can still
//! see it and is released once it scrolls out of view.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use glam::Vec2;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::camera::view_rect;
use super::cell::{WorldCell, cell_number_at};
use super::events::{EventBus, GameEvent, GameEventListener, ListenerId};
use super::ship::{CollisionField, Spaceship};
use super::vector::normalize_axes;
use crate::artwork::{ArtworkSource, TerrainLoadError};
use crate::consts::{
    CELL_HEIGHT, CELL_LOAD_TIMEOUT_MS, CELL_WIDTH, SPEED_BUMP, SPEED_BUMP_EVERY_CELLS,
};
use crate::highscores::HighScores;
use crate::persistence::ScoreStore;
use crate::renderer::{FrameSnapshot, ShipPose};

/// Ship spawn point: the center of cell 0
pub const STARTING_POSITION: Vec2 =
    Vec2::new(CELL_WIDTH as f32 / 2.0, CELL_HEIGHT as f32 / 2.0);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorldPhase {
    /// Constructed, `restart` not called yet
    Uninitialized,
    Running,
    /// Ship hit terrain; waiting for `restart`
    Crashed,
}

/// Result of one simulation tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Continue,
    GameOver { score: u32 },
}

#[derive(Debug, Error)]
pub enum WorldError {
    #[error("world is not running; call restart() first")]
    NotRunning,
    #[error("terrain unavailable: {0}")]
    Terrain(#[from] TerrainLoadError),
}

/// Where each run's seed basis comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SeedPolicy {
    /// Wall-clock milliseconds at every restart
    Clock,
    /// Same basis every run
    Fixed(u64),
}

#[derive(Debug, Clone)]
pub struct WorldConfig {
    /// Longest wait for a newly entered cell to finish loading
    pub load_timeout: Duration,
    pub seed: SeedPolicy,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            load_timeout: Duration::from_millis(CELL_LOAD_TIMEOUT_MS),
            seed: SeedPolicy::Clock,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Travel {
    Forward,
    Backward,
}

impl Travel {
    fn step(self) -> i32 {
        match self {
            Travel::Forward => 1,
            Travel::Backward => -1,
        }
    }
}

pub struct World {
    artwork: Arc<dyn ArtworkSource>,
    scores: Arc<dyn ScoreStore>,
    events: EventBus,
    config: WorldConfig,
    phase: WorldPhase,
    /// Resident cells, ascending cell number, contiguous
    cells: VecDeque<WorldCell>,
    current_cell: i32,
    travel: Travel,
    ship: Spaceship,
    seed_base: u64,
    /// Ticks since the last restart
    ticks: u64,
    /// Final score of a crashed run not yet written to the score table
    unrecorded_score: Option<u32>,
}

fn clock_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}

impl World {
    pub fn new(
        artwork: Arc<dyn ArtworkSource>,
        scores: Arc<dyn ScoreStore>,
        config: WorldConfig,
    ) -> Self {
        Self {
            artwork,
            scores,
            events: EventBus::new(),
            config,
            phase: WorldPhase::Uninitialized,
            cells: VecDeque::with_capacity(3),
            current_cell: 0,
            travel: Travel::Forward,
            ship: Spaceship::new(STARTING_POSITION),
            seed_base: 0,
            ticks: 0,
            unrecorded_score: None,
        }
    }

    pub fn subscribe(&mut self, listener: impl GameEventListener + 'static) -> ListenerId {
        self.events.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.events.unsubscribe(id)
    }

    pub fn set_seed_policy(&mut self, seed: SeedPolicy) {
        self.config.seed = seed;
    }

    pub fn phase(&self) -> WorldPhase {
        self.phase
    }

    pub fn ship(&self) -> &Spaceship {
        &self.ship
    }

    pub fn current_cell(&self) -> i32 {
        self.current_cell
    }

    pub fn seed_base(&self) -> u64 {
        self.seed_base
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Resident cells, ascending cell number
    pub fn cells(&self) -> impl Iterator<Item = &WorldCell> {
        self.cells.iter()
    }

    /// Cell numbers currently resident
    pub fn resident_cells(&self) -> Vec<i32> {
        self.cells.iter().map(WorldCell::cell_number).collect()
    }

    /// Start a new run: fresh ship at the start position, cells 0 and 1
    /// loaded synchronously. A crashed run's score is recorded first if
    /// nobody did yet.
    pub fn restart(&mut self) -> Result<(), WorldError> {
        self.record_final_score();
        self.seed_base = match self.config.seed {
            SeedPolicy::Clock => clock_seed(),
            SeedPolicy::Fixed(seed) => seed,
        };

        for cell in self.cells.drain(..) {
            cell.unload();
        }
        self.phase = WorldPhase::Uninitialized;
        self.ship = Spaceship::new(STARTING_POSITION);
        self.current_cell = 0;
        self.travel = Travel::Forward;
        self.ticks = 0;

        for cell_number in [0, 1] {
            let cell = WorldCell::generate(Arc::clone(&self.artwork), self.seed_base, cell_number)?;
            cell.load()?;
            self.cells.push_back(cell);
        }

        self.phase = WorldPhase::Running;
        log::info!(
            "World restarted (seed {}, cells {:?})",
            self.seed_base,
            self.resident_cells()
        );
        self.events.emit(GameEvent::GameStarted);
        Ok(())
    }

    /// Advance one tick with the raw tilt input.
    pub fn update(&mut self, accel_x: f32, accel_y: f32) -> Result<TickOutcome, WorldError> {
        match self.phase {
            WorldPhase::Uninitialized => return Err(WorldError::NotRunning),
            WorldPhase::Crashed => {
                return Ok(TickOutcome::GameOver {
                    score: self.ship.score(),
                });
            }
            WorldPhase::Running => {}
        }
        self.ticks += 1;

        let direction = normalize_axes(Vec2::new(accel_x, accel_y));
        self.ship.advance(direction);
        self.ship.update_score();

        // A ship outside every resident cell skips paging this tick
        if let Some(entered) = self.resident_cell_at(self.ship.position.y) {
            if entered != self.current_cell {
                self.enter_cell(entered)?;
            }
        }
        self.settle_window()?;

        if self.ship.collision_probe(&*self) {
            return Ok(self.crash());
        }
        Ok(TickOutcome::Continue)
    }

    fn crash(&mut self) -> TickOutcome {
        let score = self.ship.score();
        self.ship.stop();
        self.phase = WorldPhase::Crashed;
        log::info!(
            "Spaceship crashed at {:?} in cell {} (score {})",
            self.ship.position,
            self.current_cell,
            score
        );
        self.events.emit(GameEvent::SpaceshipCrash);
        self.unrecorded_score = Some(score);
        TickOutcome::GameOver { score }
    }

    /// Write the crashed run's score to the high score table.
    ///
    /// Called after the crash grace delay; does nothing unless a crash is
    /// waiting to be recorded. Returns the rank achieved, if any.
    pub fn record_final_score(&mut self) -> Option<usize> {
        let score = self.unrecorded_score.take()?;
        let (table, rank) = HighScores::record(self.scores.as_ref(), score);
        match rank {
            Some(rank) => log::info!("Score {} ranked #{} of {}", score, rank, table.len()),
            None => log::info!("Score {} did not make the high score table", score),
        }
        rank
    }

    /// Resident cell whose rows contain world `y`
    fn resident_cell_at(&self, y: f32) -> Option<i32> {
        self.cells
            .iter()
            .find(|cell| cell.contains_y(y))
            .map(WorldCell::cell_number)
    }

    fn position_of(&self, cell_number: i32) -> Option<usize> {
        self.cells
            .iter()
            .position(|cell| cell.cell_number() == cell_number)
    }

    /// Page in `cell_number` on a loader thread if it isn't resident
    fn ensure_cell(&mut self, cell_number: i32) -> Result<(), WorldError> {
        if self.position_of(cell_number).is_some() {
            return Ok(());
        }
        let cell = WorldCell::generate(Arc::clone(&self.artwork), self.seed_base, cell_number)?;
        cell.load_async();
        log::info!("Paging in cell {} ({})", cell_number, cell.artwork());

        let at = self.cells.partition_point(|c| c.cell_number() < cell_number);
        self.cells.insert(at, cell);
        Ok(())
    }

    /// Make `entered` the current cell once its pixels are in.
    ///
    /// On error the current cell is left unchanged, so the next tick waits
    /// for `entered` again.
    fn enter_cell(&mut self, entered: i32) -> Result<(), WorldError> {
        self.travel = if entered > self.current_cell {
            Travel::Forward
        } else {
            Travel::Backward
        };
        self.ensure_cell(entered + self.travel.step())?;
        self.wait_for(entered)?;
        self.current_cell = entered;

        if entered % SPEED_BUMP_EVERY_CELLS == 0 {
            self.ship.bump_speed(SPEED_BUMP);
            log::info!("Cell {}: speed up to {}", entered, self.ship.speed());
        }
        Ok(())
    }

    /// Collision tests must never run against a cell that is still loading
    fn wait_for(&self, cell_number: i32) -> Result<(), WorldError> {
        let Some(index) = self.position_of(cell_number) else {
            return Ok(());
        };
        let cell = &self.cells[index];
        match cell.wait_loaded(self.config.load_timeout) {
            Ok(()) => Ok(()),
            Err(timeout @ TerrainLoadError::Timeout { .. }) => Err(timeout.into()),
            Err(error) => {
                log::warn!(
                    "Cell {} not loaded ({}), retrying synchronously",
                    cell_number,
                    error
                );
                cell.load()?;
                Ok(())
            }
        }
    }

    /// Page in anything the camera can see, release anything it can't
    /// unless it's the current or next cell.
    fn settle_window(&mut self) -> Result<(), WorldError> {
        let view = view_rect(self.ship.position);
        let nearest = cell_number_at((view.bottom - 1) as f32);
        let farthest = cell_number_at(view.top as f32);
        for cell_number in nearest..=farthest {
            self.ensure_cell(cell_number)?;
        }

        let current = self.current_cell;
        let ahead = current + self.travel.step();
        let mut index = 0;
        while index < self.cells.len() {
            let cell = &self.cells[index];
            let (top, bottom) = cell.rows();
            let keep = cell.cell_number() == current
                || cell.cell_number() == ahead
                || view.overlaps_rows(top, bottom);
            if keep {
                index += 1;
                continue;
            }
            if let Some(cell) = self.cells.remove(index) {
                cell.unload();
                log::info!("Paged out cell {}", cell.cell_number());
            }
        }
        Ok(())
    }

    /// Immutable view of everything a renderer needs
    pub fn snapshot(&self) -> FrameSnapshot {
        FrameSnapshot {
            tick: self.ticks,
            phase: self.phase,
            cells: self.cells.iter().map(WorldCell::view).collect(),
            ship: ShipPose {
                position: self.ship.position,
                rotation_degrees: self.ship.rotation_degrees(),
            },
            score: self.ship.score(),
            speed: self.ship.speed(),
            view: view_rect(self.ship.position),
        }
    }
}

impl CollisionField for World {
    /// Terrain test at a world position.
    ///
    /// Positions outside every resident cell, or outside a cell's pixel
    /// area, never collide. Near a cell edge this can miss a hit for a
    /// tick; it is caught once the window catches up.
    fn check_collision(&self, world_position: Vec2) -> bool {
        let Some(cell) = self.cells.iter().find(|c| c.contains_y(world_position.y)) else {
            return false;
        };
        let local = world_position - cell.origin();
        cell.check_collision_at(local.x.floor() as i32, local.y.floor() as i32)
    }
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("phase", &self.phase)
            .field("current_cell", &self.current_cell)
            .field("cells", &self.resident_cells())
            .field("ship", &self.ship)
            .field("seed_base", &self.seed_base)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artwork::{MemoryArtwork, Size};
    use crate::persistence::MemoryScoreStore;
    use crate::artwork::ArtworkId;
    use crate::sim::vector::FORWARD;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    const FULL: Size = Size::new(CELL_WIDTH, CELL_HEIGHT);

    fn open_artwork() -> Arc<MemoryArtwork> {
        Arc::new(
            MemoryArtwork::new(
                MemoryArtwork::open_space(FULL),
                vec![
                    MemoryArtwork::open_space(FULL),
                    MemoryArtwork::open_space(FULL),
                    MemoryArtwork::open_space(FULL),
                ],
            )
            .unwrap(),
        )
    }

    /// Start cell with a full-width wall at rows 300..310
    fn walled_artwork() -> Arc<MemoryArtwork> {
        Arc::new(
            MemoryArtwork::new(
                MemoryArtwork::with_block(FULL, 0, 300, CELL_WIDTH, 10),
                vec![MemoryArtwork::open_space(FULL)],
            )
            .unwrap(),
        )
    }

    fn world_with(artwork: Arc<MemoryArtwork>, store: Arc<MemoryScoreStore>) -> World {
        World::new(
            artwork,
            store,
            WorldConfig {
                load_timeout: Duration::from_secs(5),
                seed: SeedPolicy::Fixed(1_453_000_000_000),
            },
        )
    }

    fn event_log(world: &mut World) -> Arc<Mutex<Vec<GameEvent>>> {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&log);
        world.subscribe(move |event: GameEvent| sink.lock().unwrap().push(event));
        log
    }

    #[test]
    fn test_update_before_restart_fails() {
        let mut world = world_with(open_artwork(), Arc::default());
        assert_eq!(world.phase(), WorldPhase::Uninitialized);
        assert!(matches!(world.update(0.0, -1.0), Err(WorldError::NotRunning)));
    }

    #[test]
    fn test_restart_loads_first_two_cells() {
        let mut world = world_with(open_artwork(), Arc::default());
        let events = event_log(&mut world);
        world.restart().unwrap();

        assert_eq!(world.phase(), WorldPhase::Running);
        assert_eq!(world.resident_cells(), vec![0, 1]);
        assert!(world.cells().all(WorldCell::is_loaded));
        assert_eq!(world.ship().position, STARTING_POSITION);
        assert_eq!(world.ship().speed(), 1.0);
        assert_eq!(*events.lock().unwrap(), vec![GameEvent::GameStarted]);
    }

    #[test]
    fn test_forward_flight_crosses_into_cell_one_once() {
        let mut world = world_with(open_artwork(), Arc::default());
        world.restart().unwrap();

        let mut crossings = 0;
        let mut last_cell = world.current_cell();
        for _ in 0..1024 {
            assert_eq!(world.update(0.0, -1.0).unwrap(), TickOutcome::Continue);
            if world.current_cell() != last_cell {
                crossings += 1;
                last_cell = world.current_cell();
            }
            let resident = world.resident_cells();
            assert!(!resident.contains(&-1), "cell -1 paged in: {resident:?}");
            assert!((2..=3).contains(&resident.len()), "window {resident:?}");
        }

        assert_eq!(crossings, 1);
        assert_eq!(world.current_cell(), 1);
        assert_eq!(world.ship().position, Vec2::new(256.0, -512.0));
        assert_eq!(world.ship().score(), 1024);
        // Cell 0 scrolled out of view, steady window is current + next
        assert_eq!(world.resident_cells(), vec![1, 2]);
    }

    #[test]
    fn test_window_is_three_only_while_straddling() {
        let mut world = world_with(open_artwork(), Arc::default());
        world.restart().unwrap();

        for _ in 0..3000 {
            world.update(0.0, -1.0).unwrap();
            let resident = world.resident_cells();
            let view = view_rect(world.ship().position);
            let straddling = cell_number_at(view.top as f32)
                != cell_number_at((view.bottom - 1) as f32);
            if !straddling {
                assert_eq!(resident.len(), 2, "window {resident:?}");
            }
            assert!(resident.contains(&world.current_cell()));
            assert!(resident.contains(&(world.current_cell() + 1)));
            assert!(resident.windows(2).all(|w| w[1] == w[0] + 1));
        }
    }

    #[test]
    fn test_speed_bumps_every_third_cell() {
        let mut world = world_with(open_artwork(), Arc::default());
        world.restart().unwrap();

        let mut bumps = Vec::new();
        let mut speed = world.ship().speed();
        while world.current_cell() < 7 {
            world.update(0.0, -1.0).unwrap();
            if world.ship().speed() != speed {
                bumps.push((world.current_cell(), world.ship().speed() - speed));
                speed = world.ship().speed();
            }
        }
        assert_eq!(bumps, vec![(3, 0.5), (6, 0.5)]);
        assert_eq!(world.ship().speed(), 2.0);

        world.restart().unwrap();
        assert_eq!(world.ship().speed(), 1.0);
    }

    #[test]
    fn test_backward_drift_pages_in_cells_behind() {
        let mut world = world_with(open_artwork(), Arc::default());
        world.restart().unwrap();

        // Fly backward from the center of cell 0 into cell -1
        for _ in 0..600 {
            world.update(0.0, 1.0).unwrap();
            assert!(world.resident_cells().contains(&world.current_cell()));
        }
        assert_eq!(world.current_cell(), -1);
        assert!(world.resident_cells().contains(&-2));
        assert_eq!(world.ship().score(), 0);
    }

    #[test]
    fn test_crash_ends_the_run() {
        let store = Arc::new(MemoryScoreStore::new(vec![5000, 10]));
        let mut world = world_with(walled_artwork(), Arc::clone(&store));
        let events = event_log(&mut world);
        world.restart().unwrap();

        let mut outcome = TickOutcome::Continue;
        for _ in 0..400 {
            outcome = world.update(0.0, -1.0).unwrap();
            if outcome != TickOutcome::Continue {
                break;
            }
        }

        // Nose sits 10 px ahead of center; wall's last row is 309
        let TickOutcome::GameOver { score } = outcome else {
            panic!("expected a crash, got {outcome:?}");
        };
        assert_eq!(score, 193);
        assert_eq!(world.phase(), WorldPhase::Crashed);
        assert_eq!(world.ship().speed(), 0.0);
        assert_eq!(
            *events.lock().unwrap(),
            vec![GameEvent::GameStarted, GameEvent::SpaceshipCrash]
        );
        // The table is only touched once the grace delay is over
        assert_eq!(store.load().unwrap(), vec![5000, 10]);

        // Further updates report game over without crashing again
        assert_eq!(world.update(0.0, -1.0).unwrap(), TickOutcome::GameOver { score: 193 });
        assert_eq!(events.lock().unwrap().len(), 2);

        assert_eq!(world.record_final_score(), Some(2));
        assert_eq!(store.load().unwrap(), vec![5000, 193, 10]);
        assert_eq!(world.record_final_score(), None);
        assert_eq!(store.load().unwrap().len(), 3);
    }

    #[test]
    fn test_restart_records_pending_score() {
        let store = Arc::new(MemoryScoreStore::default());
        let mut world = world_with(walled_artwork(), Arc::clone(&store));
        world.restart().unwrap();
        assert_eq!(world.record_final_score(), None);
        while world.update(0.0, -1.0).unwrap() == TickOutcome::Continue {}

        world.restart().unwrap();
        assert_eq!(store.load().unwrap(), vec![193]);
        world.restart().unwrap();
        assert_eq!(store.load().unwrap(), vec![193]);
    }

    #[test]
    fn test_restart_after_crash() {
        let mut world = world_with(walled_artwork(), Arc::default());
        world.restart().unwrap();
        while world.update(0.0, -1.0).unwrap() == TickOutcome::Continue {}

        world.restart().unwrap();
        assert_eq!(world.phase(), WorldPhase::Running);
        assert_eq!(world.ship().score(), 0);
        assert_eq!(world.ship().speed(), 1.0);
        assert_eq!(world.update(0.0, -1.0).unwrap(), TickOutcome::Continue);
    }

    #[test]
    fn test_zero_input_holds_position() {
        let mut world = world_with(open_artwork(), Arc::default());
        world.restart().unwrap();
        world.update(0.0, 0.0).unwrap();
        assert_eq!(world.ship().position, STARTING_POSITION);
        assert_eq!(world.ship().heading, FORWARD);
    }

    #[test]
    fn test_collision_outside_window_is_ignored() {
        let mut world = world_with(walled_artwork(), Arc::default());
        world.restart().unwrap();
        assert!(world.check_collision(Vec2::new(100.0, 305.0)));
        assert!(!world.check_collision(Vec2::new(100.0, 200.0)));
        // Left of the cell, and far ahead of the window
        assert!(!world.check_collision(Vec2::new(-5.0, 305.0)));
        assert!(!world.check_collision(Vec2::new(100.0, -50_000.0)));
    }

    #[test]
    fn test_fixed_seed_reproduces_layout() {
        let mut world = world_with(open_artwork(), Arc::default());
        world.restart().unwrap();
        let first: Vec<_> = world.cells().map(|c| (c.artwork(), c.tint())).collect();
        world.restart().unwrap();
        let second: Vec<_> = world.cells().map(|c| (c.artwork(), c.tint())).collect();
        assert_eq!(first, second);

        world.set_seed_policy(SeedPolicy::Fixed(42));
        world.restart().unwrap();
        let other: Vec<_> = world.cells().map(|c| (c.artwork(), c.tint())).collect();
        assert_ne!(first, other);
    }

    #[test]
    fn test_clock_seed_changes_between_restarts() {
        let mut world = World::new(
            open_artwork(),
            Arc::new(MemoryScoreStore::default()),
            WorldConfig::default(),
        );
        world.restart().unwrap();
        let first = world.seed_base();
        assert!(first > 0);

        std::thread::sleep(Duration::from_millis(5));
        world.restart().unwrap();
        assert_ne!(world.seed_base(), first);
    }

    #[test]
    fn test_snapshot_mirrors_world() {
        let mut world = world_with(open_artwork(), Arc::default());
        world.restart().unwrap();
        world.update(1.0, 0.0).unwrap();

        let frame = world.snapshot();
        assert_eq!(frame.tick, 1);
        assert_eq!(frame.phase, WorldPhase::Running);
        assert_eq!(frame.cells.len(), 2);
        assert!(frame.cells.iter().all(|c| c.bitmap.is_some()));
        assert_eq!(frame.ship.position, Vec2::new(257.0, 512.0));
        assert!((frame.ship.rotation_degrees - 90.0).abs() < 1e-3);
        assert_eq!(frame.view, view_rect(frame.ship.position));
    }

    /// Open-space artwork whose loads can be made to fail or stall.
    ///
    /// Loads on `cell-loader-*` threads are the background ones; anything
    /// else is a synchronous load.
    struct FlakyArtwork {
        inner: MemoryArtwork,
        fail_background: bool,
        fail_everything: AtomicBool,
        background_delay: Duration,
    }

    impl FlakyArtwork {
        fn new() -> Self {
            Self {
                inner: MemoryArtwork::new(
                    MemoryArtwork::open_space(FULL),
                    vec![MemoryArtwork::open_space(FULL)],
                )
                .unwrap(),
                fail_background: false,
                fail_everything: AtomicBool::new(false),
                background_delay: Duration::ZERO,
            }
        }
    }

    impl ArtworkSource for FlakyArtwork {
        fn start_id(&self) -> ArtworkId {
            self.inner.start_id()
        }

        fn pool(&self) -> &[ArtworkId] {
            self.inner.pool()
        }

        fn decode(&self, id: ArtworkId) -> Result<image::RgbaImage, TerrainLoadError> {
            let background = std::thread::current()
                .name()
                .is_some_and(|name| name.starts_with("cell-loader"));
            if background {
                std::thread::sleep(self.background_delay);
            }
            if self.fail_everything.load(Ordering::SeqCst) || (background && self.fail_background) {
                return Err(TerrainLoadError::Decode {
                    artwork: id,
                    reason: "truncated file".to_string(),
                });
            }
            self.inner.decode(id)
        }

        fn bounds_of(&self, id: ArtworkId) -> Result<Size, TerrainLoadError> {
            self.inner.bounds_of(id)
        }
    }

    fn flaky_world(artwork: Arc<FlakyArtwork>, load_timeout: Duration) -> World {
        World::new(
            artwork,
            Arc::new(MemoryScoreStore::default()),
            WorldConfig {
                load_timeout,
                seed: SeedPolicy::Fixed(3),
            },
        )
    }

    /// Fly forward until the ship's position is inside cell 2
    fn fly_into_cell_two(world: &mut World) -> Result<TickOutcome, WorldError> {
        loop {
            let outcome = world.update(0.0, -1.0);
            if outcome.is_err() || cell_number_at(world.ship().position.y) == 2 {
                return outcome;
            }
        }
    }

    #[test]
    fn test_failed_background_load_is_retried_synchronously() {
        let artwork = Arc::new(FlakyArtwork {
            fail_background: true,
            ..FlakyArtwork::new()
        });
        let mut world = flaky_world(artwork, Duration::from_secs(5));
        world.restart().unwrap();

        assert_eq!(fly_into_cell_two(&mut world).unwrap(), TickOutcome::Continue);
        assert_eq!(world.current_cell(), 2);
        let cell = world.cells().find(|c| c.cell_number() == 2).unwrap();
        assert!(cell.is_loaded());
    }

    #[test]
    fn test_unloadable_cell_is_a_terrain_error() {
        let artwork = Arc::new(FlakyArtwork::new());
        let mut world = flaky_world(Arc::clone(&artwork), Duration::from_secs(5));
        world.restart().unwrap();
        artwork.fail_everything.store(true, Ordering::SeqCst);

        let error = fly_into_cell_two(&mut world).unwrap_err();
        assert!(matches!(
            error,
            WorldError::Terrain(TerrainLoadError::Decode { .. })
        ));
        // Still in cell 1, and the next tick tries again
        assert_eq!(world.current_cell(), 1);
        assert!(matches!(world.update(0.0, -1.0), Err(WorldError::Terrain(_))));
        assert_eq!(world.current_cell(), 1);

        artwork.fail_everything.store(false, Ordering::SeqCst);
        assert_eq!(world.update(0.0, -1.0).unwrap(), TickOutcome::Continue);
        assert_eq!(world.current_cell(), 2);
    }

    #[test]
    fn test_slow_cell_times_out_and_is_awaited_again() {
        let artwork = Arc::new(FlakyArtwork {
            background_delay: Duration::from_secs(1),
            ..FlakyArtwork::new()
        });
        let mut world = flaky_world(artwork, Duration::from_millis(20));
        world.restart().unwrap();

        let error = fly_into_cell_two(&mut world).unwrap_err();
        assert!(matches!(
            error,
            WorldError::Terrain(TerrainLoadError::Timeout { cell: 2, waited_ms: 20 })
        ));
        assert_eq!(world.current_cell(), 1);

        // Not current yet, so the next tick waits instead of testing
        // collisions against missing pixels
        assert!(matches!(
            world.update(0.0, -1.0),
            Err(WorldError::Terrain(TerrainLoadError::Timeout { cell: 2, .. }))
        ));
        assert_eq!(world.current_cell(), 1);

        let cell = world.cells().find(|c| c.cell_number() == 2).unwrap();
        cell.wait_loaded(Duration::from_secs(10)).unwrap();
        assert_eq!(world.update(0.0, -1.0).unwrap(), TickOutcome::Continue);
        assert_eq!(world.current_cell(), 2);
    }
}
