//! Platform input adapters
//!
//! The sensor side writes tilt readings whenever they arrive; the game
//! loop polls the latest reading once per tick through [`InputSource`].

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

/// Normalized tilt for one tick, already sign-adjusted for the world's axes
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TiltInput {
    pub x: f32,
    pub y: f32,
}

impl TiltInput {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Polled by the game loop once per tick
pub trait InputSource: Send {
    fn poll(&mut self) -> TiltInput;
}

/// Latest tilt reading, shared lock-free between the sensor callback and
/// the loop thread.
#[derive(Debug, Default)]
pub struct SharedTilt {
    x: AtomicU32,
    y: AtomicU32,
}

impl SharedTilt {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set(&self, x: f32, y: f32) {
        self.x.store(x.to_bits(), Ordering::Relaxed);
        self.y.store(y.to_bits(), Ordering::Relaxed);
    }

    /// Raw accelerometer axes; Y is flipped so tilting the top of the
    /// device away steers forward (toward negative world Y).
    pub fn set_from_accelerometer(&self, ax: f32, ay: f32) {
        self.set(ax, -ay);
    }

    pub fn get(&self) -> TiltInput {
        TiltInput {
            x: f32::from_bits(self.x.load(Ordering::Relaxed)),
            y: f32::from_bits(self.y.load(Ordering::Relaxed)),
        }
    }
}

impl InputSource for Arc<SharedTilt> {
    fn poll(&mut self) -> TiltInput {
        self.get()
    }
}

/// The same input every tick
#[derive(Debug, Clone, Copy)]
pub struct ConstantTilt(pub TiltInput);

impl InputSource for ConstantTilt {
    fn poll(&mut self) -> TiltInput {
        self.0
    }
}
