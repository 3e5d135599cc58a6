//! High score table
//!
//! Top 10 distances, highest first. Stored through a [`ScoreStore`].

use serde::{Deserialize, Serialize};

use crate::persistence::ScoreStore;

/// Maximum number of high scores to keep
pub const MAX_HIGH_SCORES: usize = 10;

/// High score leaderboard, sorted descending
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct HighScores {
    scores: Vec<u32>,
}

impl HighScores {
    /// Create empty leaderboard
    pub fn new() -> Self {
        Self { scores: Vec::new() }
    }

    /// Build from stored scores in any order (sorted and capped here)
    pub fn from_scores(mut scores: Vec<u32>) -> Self {
        scores.sort_unstable_by(|a, b| b.cmp(a));
        scores.truncate(MAX_HIGH_SCORES);
        Self { scores }
    }

    pub fn scores(&self) -> &[u32] {
        &self.scores
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    /// Check if the leaderboard is empty
    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// Get the top score (if any)
    pub fn top_score(&self) -> Option<u32> {
        self.scores.first().copied()
    }

    /// Check if a score would make it onto the leaderboard
    pub fn qualifies(&self, score: u32) -> bool {
        if self.scores.len() < MAX_HIGH_SCORES {
            return true;
        }
        self.scores.last().is_none_or(|&lowest| score > lowest)
    }

    /// Get the rank a score would achieve (1-indexed, None if doesn't qualify)
    pub fn potential_rank(&self, score: u32) -> Option<usize> {
        if !self.qualifies(score) {
            return None;
        }
        let rank = self.scores.iter().position(|&s| score > s);
        Some(rank.unwrap_or(self.scores.len()) + 1)
    }

    /// Add a score, keeping the table sorted and capped.
    /// Returns the rank achieved (1-indexed) or None if it didn't qualify.
    pub fn add_score(&mut self, score: u32) -> Option<usize> {
        let rank = self.potential_rank(score)?;
        self.scores.insert(rank - 1, score);
        self.scores.truncate(MAX_HIGH_SCORES);
        Some(rank)
    }

    /// Load the table from `store`, add `score`, save it back.
    ///
    /// Store failures are logged and swallowed: an unreadable table starts
    /// fresh, an unwritable one just isn't saved.
    pub fn record(store: &dyn ScoreStore, score: u32) -> (Self, Option<usize>) {
        let mut table = match store.load() {
            Ok(scores) => Self::from_scores(scores),
            Err(error) => {
                log::warn!("Could not load high scores ({}), starting fresh", error);
                Self::new()
            }
        };

        let rank = table.add_score(score);
        match store.save(table.scores()) {
            Ok(()) => log::info!("High scores saved ({} entries)", table.len()),
            Err(error) => log::warn!("Unable to save high scores: {}", error),
        }
        (table, rank)
    }
}
