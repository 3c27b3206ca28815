//! Error types for the feedback memory subsystem.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors emitted by memory components.
#[derive(Debug, Error)]
pub enum MemoryError {
    /// The provided configuration was invalid.
    #[error("invalid memory configuration: {0}")]
    InvalidConfig(&'static str),
    /// Underlying I/O failure while writing the store file.
    #[error("i/o error on `{}`: {source}", .path.display())]
    Io {
        /// File the operation targeted.
        path: PathBuf,
        /// Source [`std::io::Error`].
        source: std::io::Error,
    },
    /// A persisted or imported file could not be read or decoded.
    #[error("malformed memory file `{}`: {reason}", .path.display())]
    Format {
        /// File that failed to load.
        path: PathBuf,
        /// Human-readable reason describing the failure.
        reason: String,
    },
    /// A record index was outside the bounds of the store.
    #[error("feedback index {index} out of range (store holds {len} records)")]
    IndexOutOfRange {
        /// Index requested by the caller.
        index: usize,
        /// Number of records at the time of the call.
        len: usize,
    },
    /// The embedding backend failed to produce a vector.
    #[error("embedding provider `{provider}` failed: {reason}")]
    Provider {
        /// Identifier of the backend that failed.
        provider: String,
        /// Human-readable reason describing the failure.
        reason: String,
    },
    /// An embedding vector failed validation.
    #[error("invalid embedding: {0}")]
    InvalidEmbedding(&'static str),
}

impl MemoryError {
    /// Helper to construct provider errors from string-like values.
    #[must_use]
    pub fn provider(provider: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            reason: reason.into(),
        }
    }

    /// Helper to construct format errors for the supplied path.
    #[must_use]
    pub fn format(path: &Path, reason: impl Into<String>) -> Self {
        Self::Format {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }

    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Result type alias for memory operations.
pub type MemoryResult<T> = Result<T, MemoryError>;
