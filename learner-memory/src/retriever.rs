//! Linear-scan cosine similarity retrieval over stored feedback.
//!
//! Each query is O(n) in the number of records; no index is maintained.

use std::num::NonZeroUsize;

use crate::embeddings::EmbeddingVector;
use crate::record::FeedbackRecord;
use crate::{MemoryError, MemoryResult};

/// Threshold and cap applied to every retrieval.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Retriever {
    threshold: f32,
    max_matches: NonZeroUsize,
}

impl Retriever {
    /// Creates a retriever keeping at most `max_matches` records scoring at
    /// least `threshold`.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::InvalidConfig`] when `threshold` is not a finite
    /// value in `[0, 1]`.
    pub fn new(threshold: f32, max_matches: NonZeroUsize) -> MemoryResult<Self> {
        if !threshold.is_finite() || !(0.0..=1.0).contains(&threshold) {
            return Err(MemoryError::InvalidConfig(
                "similarity threshold must be within [0, 1]",
            ));
        }
        Ok(Self {
            threshold,
            max_matches,
        })
    }

    /// Returns the minimum similarity score.
    #[must_use]
    pub const fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Returns the maximum number of matches per query.
    #[must_use]
    pub const fn max_matches(&self) -> NonZeroUsize {
        self.max_matches
    }

    /// Scores every record against `query` and returns the best matches.
    ///
    /// Matches are ordered by descending score; ties keep store order, so
    /// earlier feedback wins. An empty result is a normal outcome.
    #[must_use]
    pub fn retrieve(&self, query: &EmbeddingVector, records: &[FeedbackRecord]) -> Vec<ScoredFeedback> {
        let mut matches: Vec<ScoredFeedback> = records
            .iter()
            .enumerate()
            .filter_map(|(index, record)| {
                let score = query.cosine_similarity(record.embedding());
                (score >= self.threshold).then(|| ScoredFeedback {
                    index,
                    record: record.clone(),
                    score,
                })
            })
            .collect();

        // `sort_by` is stable, which preserves store order on equal scores.
        matches.sort_by(|a, b| b.score.total_cmp(&a.score));
        matches.truncate(self.max_matches.get());
        matches
    }
}

/// A stored record paired with its similarity to the query.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredFeedback {
    index: usize,
    record: FeedbackRecord,
    score: f32,
}

impl ScoredFeedback {
    /// Position of the record in the store at retrieval time.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }

    /// The matched record.
    #[must_use]
    pub fn record(&self) -> &FeedbackRecord {
        &self.record
    }

    /// Cosine similarity score.
    #[must_use]
    pub const fn score(&self) -> f32 {
        self.score
    }
}
