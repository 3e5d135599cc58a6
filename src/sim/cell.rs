//! World cells: fixed-size tiles of terrain along the travel axis
//!
//! Cell `n` spans world rows `[-n * CELL_HEIGHT, -(n - 1) * CELL_HEIGHT)`,
//! so cell numbers grow as the ship flies toward negative Y. A cell is
//! created with its pixels unloaded; `load` decodes them in place and
//! `load_async` decodes them on a background thread. Completion is
//! signalled through a condition variable, so the simulation can wait for
//! it with a timeout instead of spinning.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use glam::Vec2;
use image::RgbaImage;
use rand::{Rng, RngCore, SeedableRng};
use rand_pcg::Pcg32;

use super::camera::{CameraConfig, IntRect};
use super::color::{ColorGenerator, Rgb};
use crate::artwork::{ArtworkId, ArtworkSource, Size, TerrainBitmap, TerrainLoadError};
use crate::consts::{CELL_HEIGHT, CELL_WIDTH};
use crate::renderer::{CellView, DrawCall, terrain_blit};

/// Where a cell's pixels are in their lifecycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadStatus {
    /// Never asked to load
    Pending,
    Loading,
    Loaded,
    Failed(TerrainLoadError),
    Unloaded,
}

#[derive(Debug)]
struct SlotState {
    /// Bumped by every load request and every unload; a finishing load
    /// only lands if nothing superseded it
    generation: u64,
    status: LoadStatus,
    bitmap: Option<TerrainBitmap>,
}

/// Pixels plus load status, shared with the loader thread
#[derive(Debug)]
struct LoadSlot {
    state: Mutex<SlotState>,
    ready: Condvar,
}

impl LoadSlot {
    fn new() -> Self {
        Self {
            state: Mutex::new(SlotState {
                generation: 0,
                status: LoadStatus::Pending,
                bitmap: None,
            }),
            ready: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SlotState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn begin(&self) -> u64 {
        let mut state = self.lock();
        state.generation += 1;
        state.status = LoadStatus::Loading;
        state.generation
    }

    /// Store a decode result. Returns false if it was superseded.
    fn finish(&self, generation: u64, result: Result<RgbaImage, TerrainLoadError>) -> bool {
        let mut state = self.lock();
        if state.generation != generation {
            return false;
        }
        match result {
            Ok(pixels) => {
                state.bitmap = Some(Arc::new(pixels));
                state.status = LoadStatus::Loaded;
            }
            Err(error) => {
                state.bitmap = None;
                state.status = LoadStatus::Failed(error);
            }
        }
        drop(state);
        self.ready.notify_all();
        true
    }
}

/// One tile of terrain
pub struct WorldCell {
    cell_number: i32,
    /// Top-left corner in world coordinates
    origin: Vec2,
    tint: Rgb,
    artwork: ArtworkId,
    /// Artwork dimensions, read without decoding pixels
    bounds: Size,
    source: Arc<dyn ArtworkSource>,
    slot: Arc<LoadSlot>,
}

impl std::fmt::Debug for WorldCell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorldCell")
            .field("cell_number", &self.cell_number)
            .field("origin", &self.origin)
            .field("artwork", &self.artwork)
            .field("status", &self.status())
            .finish()
    }
}

/// World-space top-left corner of cell `cell_number`
pub fn cell_origin(cell_number: i32) -> Vec2 {
    Vec2::new(0.0, -(cell_number as f32) * CELL_HEIGHT as f32)
}

/// Cell number whose rows contain world `y`
pub fn cell_number_at(y: f32) -> i32 {
    -((y / CELL_HEIGHT as f32).floor() as i32)
}

impl WorldCell {
    /// Create an unloaded cell. Reads only the artwork's dimensions.
    pub fn new(
        cell_number: i32,
        artwork: ArtworkId,
        tint: Rgb,
        source: Arc<dyn ArtworkSource>,
    ) -> Result<Self, TerrainLoadError> {
        let bounds = source.bounds_of(artwork)?;
        Ok(Self {
            cell_number,
            origin: cell_origin(cell_number),
            tint,
            artwork,
            bounds,
            source,
            slot: Arc::new(LoadSlot::new()),
        })
    }

    /// Create cell `cell_number` for a run seeded with `seed_base`.
    ///
    /// Cell 0 always uses the start artwork; every other cell draws from
    /// the pool. The same seed base and cell number always give the same
    /// tint and artwork.
    pub fn generate(
        source: Arc<dyn ArtworkSource>,
        seed_base: u64,
        cell_number: i32,
    ) -> Result<Self, TerrainLoadError> {
        let mut rng = Pcg32::seed_from_u64(seed_base.wrapping_add(cell_number as i64 as u64));
        let tint = ColorGenerator::tint(rng.next_u64());

        let artwork = if cell_number == 0 {
            source.start_id()
        } else {
            let pool = source.pool();
            if pool.is_empty() {
                return Err(TerrainLoadError::EmptyPool);
            }
            pool[rng.random_range(0..pool.len())]
        };

        Self::new(cell_number, artwork, tint, source)
    }

    pub fn cell_number(&self) -> i32 {
        self.cell_number
    }

    pub fn origin(&self) -> Vec2 {
        self.origin
    }

    pub fn tint(&self) -> Rgb {
        self.tint
    }

    pub fn artwork(&self) -> ArtworkId {
        self.artwork
    }

    pub fn bounds(&self) -> Size {
        self.bounds
    }

    /// Whether world row `y` lies inside this cell
    pub fn contains_y(&self, y: f32) -> bool {
        y >= self.origin.y && y < self.origin.y + CELL_HEIGHT as f32
    }

    /// World rows covered by this cell, as integers `[top, bottom)`
    pub fn rows(&self) -> (i32, i32) {
        let top = self.origin.y as i32;
        (top, top + CELL_HEIGHT as i32)
    }

    pub fn status(&self) -> LoadStatus {
        self.slot.lock().status.clone()
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.slot.lock().status, LoadStatus::Loaded)
    }

    pub fn bitmap(&self) -> Option<TerrainBitmap> {
        self.slot.lock().bitmap.clone()
    }

    /// Terrain hit test at cell-local pixel `(x, y)`.
    ///
    /// True iff pixels are loaded and the pixel's alpha is non-zero. An
    /// unloaded (or still loading) cell never collides.
    pub fn check_collision_at(&self, x: i32, y: i32) -> bool {
        if x < 0 || y < 0 || x >= CELL_WIDTH as i32 || y >= CELL_HEIGHT as i32 {
            return false;
        }
        let state = self.slot.lock();
        state.bitmap.as_ref().is_some_and(|pixels| {
            let (x, y) = (x as u32, y as u32);
            x < pixels.width() && y < pixels.height() && pixels.get_pixel(x, y)[3] > 0
        })
    }

    /// Decode pixels on the calling thread. Calling again reloads.
    pub fn load(&self) -> Result<(), TerrainLoadError> {
        let generation = self.slot.begin();
        let result = self.source.decode(self.artwork);
        let outcome = result.as_ref().map(|_| ()).map_err(Clone::clone);
        self.slot.finish(generation, result);
        if let Err(error) = &outcome {
            log::error!("Cell {} failed to load: {}", self.cell_number, error);
        }
        outcome
    }

    /// Decode pixels on a background thread. Observe completion with
    /// [`is_loaded`](Self::is_loaded) or [`wait_loaded`](Self::wait_loaded).
    pub fn load_async(&self) {
        let generation = self.slot.begin();
        let slot = Arc::clone(&self.slot);
        let source = Arc::clone(&self.source);
        let artwork = self.artwork;
        let cell_number = self.cell_number;

        let spawned = std::thread::Builder::new()
            .name(format!("cell-loader-{cell_number}"))
            .spawn(move || {
                let result = source.decode(artwork);
                if let Err(error) = &result {
                    log::error!("Cell {} failed to load: {}", cell_number, error);
                }
                if !slot.finish(generation, result) {
                    log::debug!("Cell {} load superseded, discarded", cell_number);
                }
            });

        if let Err(error) = spawned {
            log::warn!(
                "Could not spawn loader for cell {}: {}; loading inline",
                cell_number,
                error
            );
            let result = self.source.decode(artwork);
            self.slot.finish(generation, result);
        }
    }

    /// Block until the current load finishes, at most `timeout`.
    pub fn wait_loaded(&self, timeout: Duration) -> Result<(), TerrainLoadError> {
        let guard = self.slot.lock();
        let (state, _) = self
            .slot
            .ready
            .wait_timeout_while(guard, timeout, |s| matches!(s.status, LoadStatus::Loading))
            .unwrap_or_else(PoisonError::into_inner);

        match &state.status {
            LoadStatus::Loaded => Ok(()),
            LoadStatus::Failed(error) => Err(error.clone()),
            LoadStatus::Loading => Err(TerrainLoadError::Timeout {
                cell: self.cell_number,
                waited_ms: timeout.as_millis() as u64,
            }),
            LoadStatus::Pending | LoadStatus::Unloaded => Err(TerrainLoadError::NotLoaded {
                cell: self.cell_number,
            }),
        }
    }

    /// Free the pixels. Any load still in flight is discarded when it lands.
    pub fn unload(&self) {
        let mut state = self.slot.lock();
        state.generation += 1;
        state.bitmap = None;
        state.status = LoadStatus::Unloaded;
        drop(state);
        self.slot.ready.notify_all();
    }

    /// Terrain draw call for the part of this cell inside `view`
    pub fn draw(&self, view: IntRect, camera: &CameraConfig) -> Option<DrawCall> {
        let bitmap = self.bitmap()?;
        let blit = terrain_blit(self.origin, self.bounds, view, camera)?;
        Some(DrawCall::Terrain {
            cell_number: self.cell_number,
            src: blit.src,
            dst: blit.dst,
            tint: self.tint,
            bitmap,
        })
    }

    /// Read-only view for a frame snapshot
    pub fn view(&self) -> CellView {
        CellView {
            cell_number: self.cell_number,
            origin: self.origin,
            bounds: self.bounds,
            tint: self.tint,
            artwork: self.artwork,
            bitmap: self.bitmap(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artwork::MemoryArtwork;
    use crate::sim::camera::view_rect;

    const FULL: Size = Size::new(CELL_WIDTH, CELL_HEIGHT);

    fn artwork() -> Arc<dyn ArtworkSource> {
        Arc::new(
            MemoryArtwork::new(
                MemoryArtwork::open_space(FULL),
                vec![
                    MemoryArtwork::with_block(FULL, 100, 200, 10, 10),
                    MemoryArtwork::open_space(FULL),
                    MemoryArtwork::with_block(FULL, 0, 0, 512, 16),
                ],
            )
            .unwrap(),
        )
    }

    /// Decoding always fails
    struct BrokenArtwork;

    const BROKEN_POOL: &[ArtworkId] = &[ArtworkId(1)];

    impl ArtworkSource for BrokenArtwork {
        fn start_id(&self) -> ArtworkId {
            ArtworkId(0)
        }
        fn pool(&self) -> &[ArtworkId] {
            BROKEN_POOL
        }
        fn decode(&self, id: ArtworkId) -> Result<RgbaImage, TerrainLoadError> {
            Err(TerrainLoadError::Decode {
                artwork: id,
                reason: "corrupt".to_string(),
            })
        }
        fn bounds_of(&self, _id: ArtworkId) -> Result<Size, TerrainLoadError> {
            Ok(FULL)
        }
    }

    fn block_cell() -> WorldCell {
        WorldCell::new(1, ArtworkId(1), Rgb::new(20, 20, 20), artwork()).unwrap()
    }

    #[test]
    fn test_cell_number_at() {
        assert_eq!(cell_number_at(0.0), 0);
        assert_eq!(cell_number_at(1023.9), 0);
        assert_eq!(cell_number_at(-0.5), 1);
        assert_eq!(cell_number_at(-1024.0), 1);
        assert_eq!(cell_number_at(-1024.5), 2);
        assert_eq!(cell_number_at(1024.0), -1);
        assert_eq!(cell_origin(2), Vec2::new(0.0, -2048.0));
    }

    #[test]
    fn test_contains_y() {
        let cell = block_cell();
        assert!(cell.contains_y(-1024.0));
        assert!(cell.contains_y(-0.01));
        assert!(!cell.contains_y(0.0));
        assert!(!cell.contains_y(-1024.5));
    }

    #[test]
    fn test_unloaded_cell_never_collides() {
        let cell = block_cell();
        assert_eq!(cell.status(), LoadStatus::Pending);
        assert!(!cell.check_collision_at(105, 205));
    }

    #[test]
    fn test_collision_follows_alpha() {
        let cell = block_cell();
        cell.load().unwrap();
        assert!(cell.is_loaded());
        assert!(cell.check_collision_at(105, 205));
        assert!(!cell.check_collision_at(50, 50));
        assert!(!cell.check_collision_at(-1, 205));
        assert!(!cell.check_collision_at(105, CELL_HEIGHT as i32));
    }

    #[test]
    fn test_load_is_idempotent_and_unload_reverts() {
        let cell = block_cell();
        cell.load().unwrap();
        cell.load().unwrap();
        assert!(cell.check_collision_at(105, 205));

        cell.unload();
        assert_eq!(cell.status(), LoadStatus::Unloaded);
        assert!(!cell.check_collision_at(105, 205));
        assert!(cell.bitmap().is_none());
        cell.unload();
        assert_eq!(cell.status(), LoadStatus::Unloaded);
    }

    #[test]
    fn test_load_async_signals_completion() {
        let cell = block_cell();
        cell.load_async();
        cell.wait_loaded(Duration::from_secs(5)).unwrap();
        assert!(cell.check_collision_at(105, 205));
    }

    #[test]
    fn test_wait_without_load_is_an_error() {
        let cell = block_cell();
        assert_eq!(
            cell.wait_loaded(Duration::from_millis(10)),
            Err(TerrainLoadError::NotLoaded { cell: 1 })
        );
    }

    #[test]
    fn test_failed_load_is_reported() {
        let cell = WorldCell::new(3, ArtworkId(1), Rgb::new(20, 20, 20), Arc::new(BrokenArtwork))
            .unwrap();
        assert!(matches!(cell.load(), Err(TerrainLoadError::Decode { .. })));
        assert!(matches!(cell.status(), LoadStatus::Failed(_)));
        assert!(!cell.check_collision_at(0, 0));

        cell.load_async();
        assert!(matches!(
            cell.wait_loaded(Duration::from_secs(5)),
            Err(TerrainLoadError::Decode { .. })
        ));
    }

    #[test]
    fn test_generate_is_deterministic() {
        let source = artwork();
        for n in [1, 2, 7, -3] {
            let a = WorldCell::generate(Arc::clone(&source), 1_700_000_000_000, n).unwrap();
            let b = WorldCell::generate(Arc::clone(&source), 1_700_000_000_000, n).unwrap();
            assert_eq!(a.artwork(), b.artwork());
            assert_eq!(a.tint(), b.tint());
            assert_ne!(a.artwork(), source.start_id());
        }
    }

    #[test]
    fn test_cell_zero_uses_start_artwork() {
        let source = artwork();
        for seed in 0..20 {
            let cell = WorldCell::generate(Arc::clone(&source), seed, 0).unwrap();
            assert_eq!(cell.artwork(), source.start_id());
            assert_eq!(cell.origin(), Vec2::ZERO);
        }
    }

    #[test]
    fn test_generate_spreads_over_pool() {
        let source = artwork();
        let mut seen = std::collections::HashSet::new();
        for n in 1..60 {
            seen.insert(WorldCell::generate(Arc::clone(&source), 99, n).unwrap().artwork());
        }
        assert_eq!(seen.len(), source.pool().len());
    }

    #[test]
    fn test_draw_requires_loaded_pixels() {
        let cell = WorldCell::new(0, ArtworkId(0), Rgb::new(20, 20, 20), artwork()).unwrap();
        let view = view_rect(Vec2::new(256.0, 512.0));
        let camera = CameraConfig::default();
        assert!(cell.draw(view, &camera).is_none());

        cell.load().unwrap();
        match cell.draw(view, &camera) {
            Some(DrawCall::Terrain { cell_number, dst, .. }) => {
                assert_eq!(cell_number, 0);
                assert_eq!(dst, IntRect::new(0, 0, 360, 640));
            }
            other => panic!("expected terrain call, got {other:?}"),
        }
    }
}
