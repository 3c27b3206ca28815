//! Offline feature-hashing embedder.
//!
//! Matches on shared words and spelling only, not meaning; it backs the
//! `hashed` backend for builds and tests that cannot load a model.
//!
//! Word tokens and character trigrams are hashed into signed buckets with
//! SHA-256. Persisted vectors must stay comparable with freshly computed ones,
//! so the hash is stable across processes and toolchains.

use std::num::NonZeroUsize;

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::MemoryResult;
use crate::embeddings::{EmbeddingProvider, EmbeddingVector};

/// Dimensionality used by [`HashedEmbedder::default`].
pub const DEFAULT_DIMENSIONS: usize = 384;

const MODEL: &str = "sha256-features";
const WORD_WEIGHT: f32 = 1.0;
const TRIGRAM_WEIGHT: f32 = 0.5;

/// Deterministic bag-of-features embedder.
#[derive(Debug, Clone, Copy)]
pub struct HashedEmbedder {
    dimensions: NonZeroUsize,
}

impl HashedEmbedder {
    /// Creates an embedder producing vectors of the supplied dimensionality.
    #[must_use]
    pub const fn new(dimensions: NonZeroUsize) -> Self {
        Self { dimensions }
    }

    /// Embeds text on the calling thread.
    ///
    /// Text is lower-cased first, so inputs differing only in case map to the
    /// same vector.
    ///
    /// # Errors
    ///
    /// Never fails in practice; the result type mirrors [`EmbeddingVector::new`].
    pub fn embed_text(&self, text: &str) -> MemoryResult<EmbeddingVector> {
        let mut values = vec![0.0_f32; self.dimensions.get()];
        let lowered = text.to_lowercase();

        for word in lowered
            .split(|ch: char| !ch.is_alphanumeric())
            .filter(|word| !word.is_empty())
        {
            self.accumulate(&mut values, &format!("w:{word}"), WORD_WEIGHT);

            let padded: Vec<char> = format!(" {word} ").chars().collect();
            for window in padded.windows(3) {
                let trigram: String = window.iter().collect();
                self.accumulate(&mut values, &format!("t:{trigram}"), TRIGRAM_WEIGHT);
            }
        }

        let norm = values.iter().map(|value| value * value).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut values {
                *value /= norm;
            }
        }

        EmbeddingVector::new(values)
    }

    #[allow(clippy::cast_possible_truncation)]
    fn accumulate(&self, values: &mut [f32], feature: &str, weight: f32) {
        let digest = Sha256::digest(feature.as_bytes());
        let mut bucket = [0_u8; 8];
        bucket.copy_from_slice(&digest[..8]);
        let index = (u64::from_le_bytes(bucket) % self.dimensions.get() as u64) as usize;
        let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
        values[index] += sign * weight;
    }
}

impl Default for HashedEmbedder {
    fn default() -> Self {
        Self::new(NonZeroUsize::new(DEFAULT_DIMENSIONS).expect("non-zero"))
    }
}

#[async_trait]
impl EmbeddingProvider for HashedEmbedder {
    fn name(&self) -> &str {
        "hashed"
    }

    fn model(&self) -> &str {
        MODEL
    }

    fn dimensions(&self) -> usize {
        self.dimensions.get()
    }

    async fn embed(&self, text: &str) -> MemoryResult<EmbeddingVector> {
        self.embed_text(text)
    }
}
