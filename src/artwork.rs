//! Terrain artwork sources
//!
//! A cell only knows an [`ArtworkId`]. Decoding the pixels (and reading
//! just the dimensions for layout) is the job of an [`ArtworkSource`]:
//! - [`DirectoryArtwork`]: PNG files on disk
//! - [`MemoryArtwork`]: images held in memory (tests, headless runs)

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::{Rgba, RgbaImage};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// File name of the distinguished start artwork inside an artwork directory
pub const START_ARTWORK_FILE: &str = "start.png";

/// Identifies one piece of terrain artwork within a source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ArtworkId(pub u32);

impl fmt::Display for ArtworkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "artwork#{}", self.0)
    }
}

/// Pixel dimensions of an artwork
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Decoded terrain pixels. Shared read-only once decoded.
pub type TerrainBitmap = Arc<RgbaImage>;

/// Why terrain pixels could not be produced.
///
/// Cloneable so a failed load can be parked in a cell and handed to
/// every caller that waits on it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TerrainLoadError {
    #[error("{0} is not known to the artwork source")]
    UnknownArtwork(ArtworkId),
    #[error("artwork pool is empty; at least one non-start artwork is required")]
    EmptyPool,
    #[error("failed to read {path}: {reason}")]
    Io { path: PathBuf, reason: String },
    #[error("failed to decode {artwork}: {reason}")]
    Decode { artwork: ArtworkId, reason: String },
    #[error("cell {cell} did not finish loading within {waited_ms} ms")]
    Timeout { cell: i32, waited_ms: u64 },
    #[error("cell {cell} has no load in progress")]
    NotLoaded { cell: i32 },
}

/// Provides terrain artwork by id.
pub trait ArtworkSource: Send + Sync {
    /// Artwork used for cell 0
    fn start_id(&self) -> ArtworkId;

    /// Artworks eligible for every other cell (never includes the start id)
    fn pool(&self) -> &[ArtworkId];

    /// Full pixel decode
    fn decode(&self, id: ArtworkId) -> Result<RgbaImage, TerrainLoadError>;

    /// Dimensions only, without decoding pixels
    fn bounds_of(&self, id: ArtworkId) -> Result<Size, TerrainLoadError>;
}

/// PNG artwork read from a directory.
///
/// `start.png` is the start artwork; every other `*.png` (sorted by file
/// name) makes up the pool.
#[derive(Debug, Clone)]
pub struct DirectoryArtwork {
    root: PathBuf,
    /// Index 0 is the start artwork, ids are indices
    files: Vec<PathBuf>,
    pool: Vec<ArtworkId>,
}

impl DirectoryArtwork {
    pub fn open(root: impl AsRef<Path>) -> Result<Self, TerrainLoadError> {
        let root = root.as_ref().to_path_buf();
        let io_error = |path: &Path, error: std::io::Error| TerrainLoadError::Io {
            path: path.to_path_buf(),
            reason: error.to_string(),
        };

        let start = root.join(START_ARTWORK_FILE);
        if !start.is_file() {
            return Err(TerrainLoadError::Io {
                path: start,
                reason: "start artwork missing".to_string(),
            });
        }

        let mut others = Vec::new();
        for entry in std::fs::read_dir(&root).map_err(|e| io_error(&root, e))? {
            let path = entry.map_err(|e| io_error(&root, e))?.path();
            let is_png = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("png"));
            if is_png && path != start {
                others.push(path);
            }
        }
        others.sort();

        if others.is_empty() {
            return Err(TerrainLoadError::EmptyPool);
        }

        let pool = (1..=others.len() as u32).map(ArtworkId).collect();
        let mut files = Vec::with_capacity(others.len() + 1);
        files.push(start);
        files.extend(others);

        log::info!(
            "Artwork directory {} opened ({} pool images)",
            root.display(),
            files.len() - 1
        );
        Ok(Self { root, files, pool })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_of(&self, id: ArtworkId) -> Result<&Path, TerrainLoadError> {
        self.files
            .get(id.0 as usize)
            .map(PathBuf::as_path)
            .ok_or(TerrainLoadError::UnknownArtwork(id))
    }
}

impl ArtworkSource for DirectoryArtwork {
    fn start_id(&self) -> ArtworkId {
        ArtworkId(0)
    }

    fn pool(&self) -> &[ArtworkId] {
        &self.pool
    }

    fn decode(&self, id: ArtworkId) -> Result<RgbaImage, TerrainLoadError> {
        let path = self.path_of(id)?;
        let reader = image::ImageReader::open(path).map_err(|e| TerrainLoadError::Io {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let decoded = reader.decode().map_err(|e| TerrainLoadError::Decode {
            artwork: id,
            reason: e.to_string(),
        })?;
        Ok(decoded.to_rgba8())
    }

    fn bounds_of(&self, id: ArtworkId) -> Result<Size, TerrainLoadError> {
        let path = self.path_of(id)?;
        let (width, height) =
            image::image_dimensions(path).map_err(|e| TerrainLoadError::Decode {
                artwork: id,
                reason: e.to_string(),
            })?;
        Ok(Size::new(width, height))
    }
}

/// Artwork kept in memory.
#[derive(Debug, Clone)]
pub struct MemoryArtwork {
    /// Index 0 is the start artwork
    images: Vec<RgbaImage>,
    pool: Vec<ArtworkId>,
}

impl MemoryArtwork {
    /// `start` plus a non-empty pool of alternatives
    pub fn new(start: RgbaImage, pool: Vec<RgbaImage>) -> Result<Self, TerrainLoadError> {
        if pool.is_empty() {
            return Err(TerrainLoadError::EmptyPool);
        }
        let ids = (1..=pool.len() as u32).map(ArtworkId).collect();
        let mut images = Vec::with_capacity(pool.len() + 1);
        images.push(start);
        images.extend(pool);
        Ok(Self { images, pool: ids })
    }

    /// Fully transparent image: nothing to collide with
    pub fn open_space(size: Size) -> RgbaImage {
        RgbaImage::new(size.width, size.height)
    }

    /// Transparent image with one opaque rectangle of terrain
    pub fn with_block(size: Size, x: u32, y: u32, width: u32, height: u32) -> RgbaImage {
        let mut img = RgbaImage::new(size.width, size.height);
        for py in y..(y + height).min(size.height) {
            for px in x..(x + width).min(size.width) {
                img.put_pixel(px, py, Rgba([200, 200, 200, 255]));
            }
        }
        img
    }

    fn image(&self, id: ArtworkId) -> Result<&RgbaImage, TerrainLoadError> {
        self.images
            .get(id.0 as usize)
            .ok_or(TerrainLoadError::UnknownArtwork(id))
    }
}

impl ArtworkSource for MemoryArtwork {
    fn start_id(&self) -> ArtworkId {
        ArtworkId(0)
    }

    fn pool(&self) -> &[ArtworkId] {
        &self.pool
    }

    fn decode(&self, id: ArtworkId) -> Result<RgbaImage, TerrainLoadError> {
        self.image(id).cloned()
    }

    fn bounds_of(&self, id: ArtworkId) -> Result<Size, TerrainLoadError> {
        let img = self.image(id)?;
        Ok(Size::new(img.width(), img.height()))
    }
}
