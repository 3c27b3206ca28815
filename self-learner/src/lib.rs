//! Self-learning feedback memory for LLM agents.
//!
//! [`SelfLearner`] stores human feedback given on past tasks and, for a new
//! task, folds the feedback of similar past tasks into the system prompt. No
//! model is retrained; similarity comes from task embeddings and an optional
//! LLM pass filters out look-alike matches.
//!
//! Cargo features: `minilm` (default) runs all-MiniLM-L6-v2 locally through
//! fastembed; `openai` (default) adds the hosted embedding and selection
//! backends. With both disabled only the offline `hashed` embedder remains
//! and no HTTP or TLS stack is linked.
//!
//! ```no_run
//! use self_learner::{LearnerConfig, SelfLearner};
//!
//! # fn main() -> Result<(), self_learner::LearnerError> {
//! let learner = SelfLearner::new(LearnerConfig::builder().storage_path("memory.json").build()?)?;
//! learner.save_feedback("Write a product description", "Keep it under 100 words")?;
//! let prompt = learner.apply_feedback("Write a product description", "You are a copywriter.")?;
//! assert!(prompt.contains("Keep it under 100 words"));
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs, clippy::pedantic)]

pub mod config;
mod error;
mod learner;
pub mod selection;

pub use config::{EmbeddingBackend, LearnerConfig, LearnerConfigBuilder, SelectionBackend};
pub use error::{ErrorKind, LearnerError, LearnerResult};
pub use learner::{SelfLearner, SelfLearnerBuilder};
#[cfg(feature = "openai")]
pub use selection::LlmSelector;
pub use selection::{FeedbackSelector, SelectionError};

/// Memory types re-exported for callers inspecting records or plugging in embedders.
pub use learner_memory::{
    EmbeddingProvider, EmbeddingSpace, EmbeddingVector, FeedbackRecord, ScoredFeedback,
};
/// Prompt composition types re-exported for custom formatters.
pub use learner_prompts::{FeedbackFormatter, PromptComposer, PromptTemplate};
