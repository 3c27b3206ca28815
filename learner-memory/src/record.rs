//! Feedback record type persisted by the store.

use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::embeddings::EmbeddingVector;

/// Human feedback captured for a task, together with the task's embedding.
///
/// Records have no identity beyond their position in the store. The
/// `embedder` tag names the backend and model that produced the embedding
/// (see [`EmbeddingSpace::embedder`](crate::EmbeddingSpace::embedder)).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackRecord {
    task: String,
    feedback: String,
    embedder: String,
    embedding: EmbeddingVector,
    created_at: SystemTime,
}

impl FeedbackRecord {
    /// Creates a record stamped with the current time.
    #[must_use]
    pub fn new(
        task: impl Into<String>,
        feedback: impl Into<String>,
        embedder: impl Into<String>,
        embedding: EmbeddingVector,
    ) -> Self {
        Self {
            task: task.into(),
            feedback: feedback.into(),
            embedder: embedder.into(),
            embedding,
            created_at: SystemTime::now(),
        }
    }

    /// Overrides the creation timestamp.
    #[must_use]
    pub fn with_created_at(mut self, created_at: SystemTime) -> Self {
        self.created_at = created_at;
        self
    }

    /// Returns the task description the feedback was given for.
    #[must_use]
    pub fn task(&self) -> &str {
        &self.task
    }

    /// Returns the feedback text.
    #[must_use]
    pub fn feedback(&self) -> &str {
        &self.feedback
    }

    /// Returns the tag of the embedder that produced [`FeedbackRecord::embedding`].
    #[must_use]
    pub fn embedder(&self) -> &str {
        &self.embedder
    }

    /// Returns the embedding of [`FeedbackRecord::task`].
    #[must_use]
    pub fn embedding(&self) -> &EmbeddingVector {
        &self.embedding
    }

    /// Returns when the record was created.
    #[must_use]
    pub fn created_at(&self) -> SystemTime {
        self.created_at
    }
}
