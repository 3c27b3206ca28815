//! Embedding vectors and the provider capability that produces them.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{MemoryError, MemoryResult};

/// Wrapper type around an immutable floating-point embedding.
#[derive(Clone, PartialEq)]
pub struct EmbeddingVector {
    values: Arc<[f32]>,
}

impl EmbeddingVector {
    /// Creates a new embedding from owned values.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::InvalidEmbedding`] when the supplied vector is empty
    /// or contains non-finite values.
    pub fn new(values: Vec<f32>) -> MemoryResult<Self> {
        if values.is_empty() {
            return Err(MemoryError::InvalidEmbedding(
                "embedding vector must not be empty",
            ));
        }
        if !values.iter().all(|value| value.is_finite()) {
            return Err(MemoryError::InvalidEmbedding(
                "embedding vector contains non-finite values",
            ));
        }
        Ok(Self {
            values: Arc::<[f32]>::from(values.into_boxed_slice()),
        })
    }

    /// Returns an immutable view of the embedding data.
    #[must_use]
    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }

    /// Returns the dimensionality of the embedding.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Always `false`; [`EmbeddingVector::new`] rejects empty inputs.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Cosine similarity in `[-1, 1]`.
    ///
    /// Returns `0.0` when either side has zero magnitude or the
    /// dimensionalities differ.
    #[must_use]
    pub fn cosine_similarity(&self, other: &Self) -> f32 {
        if self.len() != other.len() {
            return 0.0;
        }
        let denominator = self.magnitude() * other.magnitude();
        if denominator == 0.0 {
            0.0
        } else {
            (self.dot(other) / denominator).clamp(-1.0, 1.0)
        }
    }

    fn dot(&self, other: &Self) -> f32 {
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| a * b)
            .sum()
    }

    fn magnitude(&self) -> f32 {
        self.values
            .iter()
            .map(|value| value * value)
            .sum::<f32>()
            .sqrt()
    }
}

impl std::fmt::Debug for EmbeddingVector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingVector")
            .field("dimensions", &self.len())
            .finish()
    }
}

impl Serialize for EmbeddingVector {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.values.as_ref().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for EmbeddingVector {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let values = Vec::<f32>::deserialize(deserializer)?;
        Self::new(values).map_err(serde::de::Error::custom)
    }
}

/// Capability implemented by every embedding backend.
///
/// Implementations must be deterministic for a fixed input and always return
/// vectors of [`EmbeddingProvider::dimensions`] length.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Short identifier used in logs and error messages (e.g. `"openai"`).
    fn name(&self) -> &str;

    /// Model behind the backend. Vectors from different models are never
    /// compared, even when their lengths agree.
    fn model(&self) -> &str;

    /// Dimensionality of every vector this backend produces.
    fn dimensions(&self) -> usize;

    /// Embeds a single piece of text.
    async fn embed(&self, text: &str) -> MemoryResult<EmbeddingVector>;
}

/// Identity of the vectors a store holds: which embedder produced them and how long they are.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddingSpace {
    embedder: String,
    dimensions: usize,
}

impl EmbeddingSpace {
    /// Space for vectors of `dimensions` values tagged `embedder`.
    #[must_use]
    pub fn new(embedder: impl Into<String>, dimensions: usize) -> Self {
        Self {
            embedder: embedder.into(),
            dimensions,
        }
    }

    /// Space produced by `provider`, tagged `<name>/<model>`.
    #[must_use]
    pub fn of(provider: &dyn EmbeddingProvider) -> Self {
        Self::new(
            format!("{}/{}", provider.name(), provider.model()),
            provider.dimensions(),
        )
    }

    /// Embedder tag stamped on every record of the space.
    #[must_use]
    pub fn embedder(&self) -> &str {
        &self.embedder
    }

    /// Length of every vector in the space.
    #[must_use]
    pub const fn dimensions(&self) -> usize {
        self.dimensions
    }
}

impl std::fmt::Display for EmbeddingSpace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({} dimensions)", self.embedder, self.dimensions)
    }
}

/// Embeds `text` and checks the result against the provider's declared dimensionality.
///
/// # Errors
///
/// Propagates provider failures and returns [`MemoryError::Provider`] when the
/// backend returns a vector of unexpected length.
pub async fn embed_checked(
    provider: &dyn EmbeddingProvider,
    text: &str,
) -> MemoryResult<EmbeddingVector> {
    let embedding = provider.embed(text).await?;
    if embedding.len() != provider.dimensions() {
        return Err(MemoryError::provider(
            provider.name(),
            format!(
                "expected {} dimensions, backend returned {}",
                provider.dimensions(),
                embedding.len()
            ),
        ));
    }
    Ok(embedding)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_vectors() {
        let err = EmbeddingVector::new(vec![]).expect_err("empty vector should error");
        assert!(matches!(err, MemoryError::InvalidEmbedding(_)));
    }

    #[test]
    fn rejects_non_finite_values() {
        let err = EmbeddingVector::new(vec![1.0, f32::NAN]).expect_err("nan not allowed");
        assert!(matches!(err, MemoryError::InvalidEmbedding(_)));
    }

    #[test]
    fn deserialization_validates_values() {
        let err = serde_json::from_str::<EmbeddingVector>("[]").expect_err("empty rejected");
        assert!(err.to_string().contains("must not be empty"));
    }

    #[test]
    fn cosine_similarity_of_parallel_and_orthogonal_vectors() {
        let a = EmbeddingVector::new(vec![1.0, 0.0]).unwrap();
        let b = EmbeddingVector::new(vec![2.0, 0.0]).unwrap();
        let c = EmbeddingVector::new(vec![0.0, 3.0]).unwrap();
        assert!((a.cosine_similarity(&b) - 1.0).abs() < f32::EPSILON);
        assert!(a.cosine_similarity(&c).abs() < f32::EPSILON);
    }

    #[test]
    fn cosine_similarity_handles_zero_and_mismatched_vectors() {
        let zero = EmbeddingVector::new(vec![0.0, 0.0]).unwrap();
        let a = EmbeddingVector::new(vec![1.0, 1.0]).unwrap();
        let wide = EmbeddingVector::new(vec![1.0, 1.0, 1.0]).unwrap();
        assert!(zero.cosine_similarity(&a).abs() < f32::EPSILON);
        assert!(a.cosine_similarity(&wide).abs() < f32::EPSILON);
    }

    struct Truncating;

    #[async_trait]
    impl EmbeddingProvider for Truncating {
        fn name(&self) -> &str {
            "truncating"
        }

        fn model(&self) -> &str {
            "half"
        }

        fn dimensions(&self) -> usize {
            4
        }

        async fn embed(&self, _text: &str) -> MemoryResult<EmbeddingVector> {
            EmbeddingVector::new(vec![1.0, 2.0])
        }
    }

    #[tokio::test]
    async fn embed_checked_rejects_wrong_dimensionality() {
        let err = embed_checked(&Truncating, "task")
            .await
            .expect_err("dimension mismatch");
        assert!(matches!(err, MemoryError::Provider { .. }));
    }

    #[test]
    fn space_is_tagged_with_name_and_model() {
        let space = EmbeddingSpace::of(&Truncating);
        assert_eq!(space.embedder(), "truncating/half");
        assert_eq!(space.dimensions(), 4);
        assert_eq!(space.to_string(), "truncating/half (4 dimensions)");
    }
}
