//! Feedback memory for self-learning agents.
//!
//! Stores human feedback keyed by the task it was given for, embeds tasks
//! through a pluggable [`EmbeddingProvider`], and retrieves feedback for new
//! tasks by cosine similarity.

#![warn(missing_docs, clippy::pedantic)]

pub mod embeddings;
mod error;
pub mod hashed;
#[cfg(feature = "minilm")]
pub mod minilm;
pub mod record;
pub mod retriever;
pub mod store;

pub use embeddings::{EmbeddingProvider, EmbeddingSpace, EmbeddingVector, embed_checked};
pub use error::{MemoryError, MemoryResult};
pub use hashed::HashedEmbedder;
#[cfg(feature = "minilm")]
pub use minilm::MiniLmEmbedder;
pub use record::FeedbackRecord;
pub use retriever::{Retriever, ScoredFeedback};
pub use store::{FeedbackStore, TaskFilter};
