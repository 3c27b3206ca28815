//! Local sentence-embedding backend: all-MiniLM-L6-v2 run through fastembed.
//!
//! The model files are downloaded on first use and cached. Inference is
//! CPU-bound, so each call runs on tokio's blocking pool.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use tracing::{debug, info};

use crate::embeddings::{EmbeddingProvider, EmbeddingVector};
use crate::{MemoryError, MemoryResult};

/// Length of every all-MiniLM-L6-v2 vector.
pub const MINILM_DIMENSIONS: usize = 384;

const PROVIDER: &str = "minilm";
const MODEL: &str = "all-MiniLM-L6-v2";

/// Embedder backed by a locally executed all-MiniLM-L6-v2 model.
pub struct MiniLmEmbedder {
    model: Arc<TextEmbedding>,
}

impl fmt::Debug for MiniLmEmbedder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MiniLmEmbedder")
            .field("model", &MODEL)
            .finish_non_exhaustive()
    }
}

impl MiniLmEmbedder {
    /// Loads the model, downloading it into `cache_dir` (or fastembed's
    /// default cache) when it is not there yet.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::Provider`] when the model cannot be fetched or
    /// initialised.
    pub fn new(cache_dir: Option<PathBuf>) -> MemoryResult<Self> {
        let mut options =
            InitOptions::new(EmbeddingModel::AllMiniLML6V2).with_show_download_progress(false);
        if let Some(dir) = cache_dir {
            options = options.with_cache_dir(dir);
        }

        let model = TextEmbedding::try_new(options)
            .map_err(|err| MemoryError::provider(PROVIDER, err.to_string()))?;
        info!(model = MODEL, "embedding model loaded");

        Ok(Self {
            model: Arc::new(model),
        })
    }
}

#[async_trait]
impl EmbeddingProvider for MiniLmEmbedder {
    fn name(&self) -> &str {
        PROVIDER
    }

    fn model(&self) -> &str {
        MODEL
    }

    fn dimensions(&self) -> usize {
        MINILM_DIMENSIONS
    }

    async fn embed(&self, text: &str) -> MemoryResult<EmbeddingVector> {
        let model = Arc::clone(&self.model);
        let input = text.to_owned();
        let mut embeddings = tokio::task::spawn_blocking(move || model.embed(vec![input], None))
            .await
            .map_err(|err| MemoryError::provider(PROVIDER, format!("embedding task failed: {err}")))?
            .map_err(|err| MemoryError::provider(PROVIDER, err.to_string()))?;

        let values = embeddings
            .pop()
            .ok_or_else(|| MemoryError::provider(PROVIDER, "model returned no embedding"))?;
        debug!(dimensions = values.len(), "embedding computed");
        EmbeddingVector::new(values)
    }
}
