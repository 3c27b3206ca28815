//! Errors surfaced by the [`SelfLearner`](crate::SelfLearner) facade.

use learner_memory::MemoryError;
use thiserror::Error;

/// Coarse classification of a [`LearnerError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The embedding backend (or a backend it depends on) failed.
    Provider,
    /// A persisted or imported file was unreadable, malformed, or dimension-mismatched.
    Format,
    /// A removal index was out of range.
    Index,
    /// Invalid construction-time configuration or misuse of the blocking API.
    Config,
    /// Writing the store file or starting the blocking runtime failed.
    Io,
}

/// Errors returned by learner operations.
#[derive(Debug, Error)]
pub enum LearnerError {
    /// Embedding the task failed; nothing was stored or composed.
    #[error("{operation}: could not embed task {task:?}: {source}")]
    Provider {
        /// Operation that failed.
        operation: &'static str,
        /// Task text supplied by the caller.
        task: String,
        /// Underlying provider failure.
        source: MemoryError,
    },
    /// A store file could not be loaded.
    #[error("{operation}: {source}")]
    Format {
        /// Operation that failed.
        operation: &'static str,
        /// Underlying format failure, carrying the path.
        source: MemoryError,
    },
    /// A removal index was out of range; the store is unchanged.
    #[error("{operation}: feedback index {index} out of range (store holds {len} records)")]
    Index {
        /// Operation that failed.
        operation: &'static str,
        /// Requested index.
        index: usize,
        /// Store length at the time of the call.
        len: usize,
    },
    /// Configuration was rejected.
    #[error("invalid configuration: {reason}")]
    Config {
        /// Human-readable reason.
        reason: String,
    },
    /// Persisting the store failed; the in-memory store is unchanged.
    #[error("{operation}: {source}")]
    Io {
        /// Operation that failed.
        operation: &'static str,
        /// Underlying I/O failure, carrying the path.
        source: MemoryError,
    },
    /// The runtime backing the blocking API could not be created.
    #[error("failed to start blocking runtime: {source}")]
    Runtime {
        /// Source [`std::io::Error`].
        #[from]
        source: std::io::Error,
    },
}

impl LearnerError {
    /// Returns the kind of failure.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Provider { .. } => ErrorKind::Provider,
            Self::Format { .. } => ErrorKind::Format,
            Self::Index { .. } => ErrorKind::Index,
            Self::Config { .. } => ErrorKind::Config,
            Self::Io { .. } | Self::Runtime { .. } => ErrorKind::Io,
        }
    }

    /// Convenience constructor for configuration errors.
    #[must_use]
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }

    /// Classifies a store failure raised while running `operation`.
    pub(crate) fn store(operation: &'static str, err: MemoryError) -> Self {
        match err {
            MemoryError::IndexOutOfRange { index, len } => Self::Index {
                operation,
                index,
                len,
            },
            MemoryError::InvalidConfig(reason) => Self::config(reason),
            MemoryError::Io { .. } => Self::Io {
                operation,
                source: err,
            },
            MemoryError::Format { .. }
            | MemoryError::Provider { .. }
            | MemoryError::InvalidEmbedding(_) => Self::Format {
                operation,
                source: err,
            },
        }
    }

    /// Wraps an embedding failure for `task`.
    pub(crate) fn provider(operation: &'static str, task: &str, source: MemoryError) -> Self {
        Self::Provider {
            operation,
            task: task.to_owned(),
            source,
        }
    }
}

/// Result alias for learner operations.
pub type LearnerResult<T> = Result<T, LearnerError>;

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;

    #[test]
    fn store_errors_map_to_kinds() {
        let index = LearnerError::store(
            "remove_feedback",
            MemoryError::IndexOutOfRange { index: 5, len: 3 },
        );
        assert_eq!(index.kind(), ErrorKind::Index);
        assert_eq!(
            index.to_string(),
            "remove_feedback: feedback index 5 out of range (store holds 3 records)"
        );

        let format = LearnerError::store(
            "import_memory",
            MemoryError::format(Path::new("memory.json"), "bad json"),
        );
        assert_eq!(format.kind(), ErrorKind::Format);
        assert!(format.to_string().contains("memory.json"));
    }

    #[test]
    fn provider_errors_name_the_task() {
        let err = LearnerError::provider(
            "save_feedback",
            "Write an email",
            MemoryError::provider("openai", "401 Unauthorized"),
        );
        assert_eq!(err.kind(), ErrorKind::Provider);
        assert!(err.to_string().contains("\"Write an email\""));
    }
}
