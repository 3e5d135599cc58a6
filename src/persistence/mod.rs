//! Score persistence
//!
//! The world hands finished scores to a [`ScoreStore`]; where and how they
//! are kept is the store's business:
//! - [`JsonFileStore`]: versioned JSON file, written atomically
//! - [`MemoryScoreStore`]: in-process only

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("score file I/O failed: {0}")]
    Io(#[from] io::Error),
    #[error("score file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported score file version {0}")]
    Version(u32),
}

/// Loads and saves the ordered score list
pub trait ScoreStore: Send + Sync {
    fn load(&self) -> Result<Vec<u32>, PersistenceError>;
    fn save(&self, scores: &[u32]) -> Result<(), PersistenceError>;
}

const SCORE_FILE_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct ScoreFile {
    version: u32,
    scores: Vec<u32>,
}

/// Scores in a JSON file. A missing file reads as an empty list.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ScoreStore for JsonFileStore {
    fn load(&self) -> Result<Vec<u32>, PersistenceError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                log::info!("No high scores at {}, starting fresh", self.path.display());
                return Ok(Vec::new());
            }
            Err(error) => return Err(error.into()),
        };
        let file: ScoreFile = serde_json::from_str(&text)?;
        if file.version != SCORE_FILE_VERSION {
            return Err(PersistenceError::Version(file.version));
        }
        Ok(file.scores)
    }

    fn save(&self, scores: &[u32]) -> Result<(), PersistenceError> {
        let file = ScoreFile {
            version: SCORE_FILE_VERSION,
            scores: scores.to_vec(),
        };
        let json = serde_json::to_string_pretty(&file)?;
        write_text_atomic(&self.path, &json)?;
        Ok(())
    }
}

/// Scores held in memory
#[derive(Debug, Default)]
pub struct MemoryScoreStore {
    scores: Mutex<Vec<u32>>,
}

impl MemoryScoreStore {
    pub fn new(scores: Vec<u32>) -> Self {
        Self {
            scores: Mutex::new(scores),
        }
    }
}

impl ScoreStore for MemoryScoreStore {
    fn load(&self) -> Result<Vec<u32>, PersistenceError> {
        Ok(self
            .scores
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn save(&self, scores: &[u32]) -> Result<(), PersistenceError> {
        *self.scores.lock().unwrap_or_else(PoisonError::into_inner) = scores.to_vec();
        Ok(())
    }
}

/// Write `text` to a sibling temp file, then move it over `path`
pub(crate) fn write_text_atomic(path: &Path, text: &str) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let tmp_path = temp_path_for(path);
    fs::write(&tmp_path, text)?;
    if let Err(error) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(error);
    }
    Ok(())
}

fn temp_path_for(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("scores");
    path.with_file_name(format!("{file_name}.tmp"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path().join("scores.json"));
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path().join("nested").join("scores.json"));
        store.save(&[900, 450, 12]).unwrap();
        assert_eq!(store.load().unwrap(), vec![900, 450, 12]);
        assert!(!dir.path().join("nested").join("scores.json.tmp").exists());

        store.save(&[1000]).unwrap();
        assert_eq!(store.load().unwrap(), vec![1000]);
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("scores.json");
        fs::write(&path, "{ not json").unwrap();
        let store = JsonFileStore::new(&path);
        assert!(matches!(store.load(), Err(PersistenceError::Json(_))));
    }

    #[test]
    fn test_unknown_version_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("scores.json");
        fs::write(&path, r#"{"version": 7, "scores": [1]}"#).unwrap();
        assert!(matches!(
            JsonFileStore::new(&path).load(),
            Err(PersistenceError::Version(7))
        ));
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryScoreStore::default();
        assert!(store.load().unwrap().is_empty());
        store.save(&[3, 2]).unwrap();
        assert_eq!(store.load().unwrap(), vec![3, 2]);
    }
}
