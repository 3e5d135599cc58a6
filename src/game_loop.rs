//! Fixed-tick game loop
//!
//! Runs on its own thread: poll input, `World::update`, publish a frame
//! snapshot and request a redraw, then sleep out the rest of the tick.
//! A crash holds for the grace delay, records the score, and restarts the
//! world; the loop only ends when stopped.
//!
//! All blocking (tick pacing, crash grace, pause) waits on one condition
//! variable, so `stop` takes effect immediately. Ticks missed while paused
//! are dropped, not caught up.

use std::io;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::consts::{CRASH_GRACE_MS, TARGET_TPS};
use crate::platform::InputSource;
use crate::renderer::{FrameSlot, FrameSnapshot};
use crate::sim::{TickOutcome, World, WorldError};

#[derive(Debug, Clone)]
pub struct LoopConfig {
    /// Target time per tick
    pub tick_interval: Duration,
    /// Hold after a crash before restarting
    pub crash_grace: Duration,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs_f64(1.0 / TARGET_TPS as f64),
            crash_grace: Duration::from_millis(CRASH_GRACE_MS),
        }
    }
}

#[derive(Debug, Error)]
pub enum LoopError {
    #[error(transparent)]
    World(#[from] WorldError),
    #[error("failed to spawn game loop thread: {0}")]
    Spawn(#[source] io::Error),
    #[error("game loop thread panicked")]
    Panicked,
}

/// Receives every published frame on the loop thread
pub trait RedrawSink: Send {
    fn request_redraw(&mut self, frame: &Arc<FrameSnapshot>);
}

impl<F> RedrawSink for F
where
    F: FnMut(&Arc<FrameSnapshot>) + Send,
{
    fn request_redraw(&mut self, frame: &Arc<FrameSnapshot>) {
        self(frame)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub ticks: u64,
    pub crashes: u64,
    pub restarts: u64,
}

#[derive(Debug, Default)]
struct ControlState {
    paused: bool,
    stopping: bool,
}

/// Pause/resume/stop signalling shared with the loop thread
#[derive(Debug, Default)]
pub struct LoopControl {
    state: Mutex<ControlState>,
    wake: Condvar,
}

impl LoopControl {
    fn lock(&self) -> MutexGuard<'_, ControlState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn pause(&self) {
        self.lock().paused = true;
        log::info!("Game loop paused");
    }

    pub fn resume(&self) {
        self.lock().paused = false;
        self.wake.notify_all();
        log::info!("Game loop resumed");
    }

    pub fn stop(&self) {
        self.lock().stopping = true;
        self.wake.notify_all();
    }

    pub fn is_paused(&self) -> bool {
        self.lock().paused
    }

    pub fn is_stopping(&self) -> bool {
        self.lock().stopping
    }

    /// Sleep for `duration` unless stopped first. False means stop.
    fn sleep(&self, duration: Duration) -> bool {
        let guard = self.lock();
        let (state, _) = self
            .wake
            .wait_timeout_while(guard, duration, |s| !s.stopping)
            .unwrap_or_else(PoisonError::into_inner);
        !state.stopping
    }

    /// Block while paused. False means stop.
    fn wait_while_paused(&self) -> bool {
        let guard = self.lock();
        let state = self
            .wake
            .wait_while(guard, |s| s.paused && !s.stopping)
            .unwrap_or_else(PoisonError::into_inner);
        !state.stopping
    }
}

pub struct GameLoop {
    world: World,
    input: Box<dyn InputSource>,
    redraw: Box<dyn RedrawSink>,
    config: LoopConfig,
    control: Arc<LoopControl>,
    frames: Arc<FrameSlot>,
    stats: Arc<Mutex<LoopStats>>,
}

impl GameLoop {
    pub fn new(
        world: World,
        input: Box<dyn InputSource>,
        redraw: Box<dyn RedrawSink>,
        config: LoopConfig,
    ) -> Self {
        Self {
            world,
            input,
            redraw,
            config,
            control: Arc::new(LoopControl::default()),
            frames: Arc::new(FrameSlot::new()),
            stats: Arc::new(Mutex::new(LoopStats::default())),
        }
    }

    pub fn control(&self) -> Arc<LoopControl> {
        Arc::clone(&self.control)
    }

    pub fn frames(&self) -> Arc<FrameSlot> {
        Arc::clone(&self.frames)
    }

    fn record(&self, f: impl FnOnce(&mut LoopStats)) {
        f(&mut self.stats.lock().unwrap_or_else(PoisonError::into_inner));
    }

    fn publish_frame(&mut self) {
        let frame = Arc::new(self.world.snapshot());
        self.frames.publish(Arc::clone(&frame));
        self.redraw.request_redraw(&frame);
    }

    fn restart_world(&mut self) -> Result<(), WorldError> {
        self.world.restart()?;
        self.record(|s| s.restarts += 1);
        self.publish_frame();
        Ok(())
    }

    /// Run on the calling thread until stopped
    pub fn run(mut self) -> Result<LoopStats, LoopError> {
        log::info!(
            "Game loop starting ({:?} per tick, {:?} crash grace)",
            self.config.tick_interval,
            self.config.crash_grace
        );
        self.restart_world()?;

        while self.control.wait_while_paused() {
            let started = Instant::now();
            let input = self.input.poll();

            match self.world.update(input.x, input.y) {
                Ok(TickOutcome::Continue) => {
                    self.record(|s| s.ticks += 1);
                    self.publish_frame();
                }
                Ok(TickOutcome::GameOver { score }) => {
                    self.record(|s| {
                        s.ticks += 1;
                        s.crashes += 1;
                    });
                    self.publish_frame();
                    log::info!("Game over with score {}", score);
                    let keep_running = self.control.sleep(self.config.crash_grace);
                    self.world.record_final_score();
                    if !keep_running {
                        break;
                    }
                    self.restart_world()?;
                    continue;
                }
                Err(WorldError::Terrain(error)) => {
                    log::error!("Terrain failure mid-run ({}), restarting", error);
                    self.restart_world()?;
                    continue;
                }
                Err(error) => return Err(error.into()),
            }

            let elapsed = started.elapsed();
            match self.config.tick_interval.checked_sub(elapsed) {
                Some(remaining) if !remaining.is_zero() => {
                    if !self.control.sleep(remaining) {
                        break;
                    }
                }
                _ => log::debug!("Tick overran its budget ({:?})", elapsed),
            }
        }

        let stats = *self.stats.lock().unwrap_or_else(PoisonError::into_inner);
        log::info!(
            "Game loop stopped after {} ticks ({} crashes)",
            stats.ticks,
            stats.crashes
        );
        Ok(stats)
    }

    /// Run on a dedicated thread
    pub fn spawn(self) -> Result<LoopHandle, LoopError> {
        let control = self.control();
        let frames = self.frames();
        let stats = Arc::clone(&self.stats);
        let thread = std::thread::Builder::new()
            .name("game-loop".to_string())
            .spawn(move || self.run())
            .map_err(LoopError::Spawn)?;
        Ok(LoopHandle {
            control,
            frames,
            stats,
            thread: Some(thread),
        })
    }
}

/// Owner-side handle of a spawned loop. Dropping it stops the loop.
pub struct LoopHandle {
    control: Arc<LoopControl>,
    frames: Arc<FrameSlot>,
    stats: Arc<Mutex<LoopStats>>,
    thread: Option<JoinHandle<Result<LoopStats, LoopError>>>,
}

impl LoopHandle {
    pub fn pause(&self) {
        self.control.pause();
    }

    pub fn resume(&self) {
        self.control.resume();
    }

    pub fn is_paused(&self) -> bool {
        self.control.is_paused()
    }

    /// Most recent frame published by the loop
    pub fn latest_frame(&self) -> Option<Arc<FrameSnapshot>> {
        self.frames.latest()
    }

    pub fn stats(&self) -> LoopStats {
        *self.stats.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stop the loop and wait for its thread
    pub fn stop(mut self) -> Result<LoopStats, LoopError> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<LoopStats, LoopError> {
        self.control.stop();
        match self.thread.take() {
            Some(thread) => thread.join().map_err(|_| LoopError::Panicked)?,
            None => Ok(self.stats()),
        }
    }
}

impl Drop for LoopHandle {
    fn drop(&mut self) {
        if self.thread.is_some() {
            if let Err(error) = self.shutdown() {
                log::error!("Game loop ended with error: {}", error);
            }
        }
    }
}
