//! Construction-time configuration for [`SelfLearner`](crate::SelfLearner).

use std::fmt;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::str::FromStr;

#[cfg(feature = "openai")]
use learner_adapters::openai::{
    DEFAULT_CHAT_MODEL, DEFAULT_EMBEDDING_DIMENSIONS, DEFAULT_EMBEDDING_MODEL,
};
use learner_memory::Retriever;
use learner_prompts::{FeedbackFormatter, PromptComposer};

use crate::{LearnerError, LearnerResult};

/// Default store location, relative to the working directory.
pub const DEFAULT_STORAGE_PATH: &str = "memory.json";
/// Default minimum cosine similarity for a stored task to match.
pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.75;
/// Default cap on matches considered per query.
pub const DEFAULT_MAX_MATCHES: usize = 3;

/// Embedding backend resolved at construction.
///
/// The default is [`MiniLm`](Self::MiniLm) when the `minilm` feature is
/// enabled and [`Hashed`](Self::Hashed) otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmbeddingBackend {
    /// all-MiniLM-L6-v2 run locally through fastembed (384 dimensions).
    #[cfg(feature = "minilm")]
    MiniLm,
    /// Offline feature-hashing embedder. Matches shared wording, not meaning.
    Hashed,
    /// `OpenAI` embeddings API, keyed by `OPENAI_API_KEY`.
    #[cfg(feature = "openai")]
    OpenAi {
        /// Embedding model name.
        model: String,
        /// Dimensionality requested from the model.
        dimensions: NonZeroUsize,
    },
}

#[cfg(feature = "minilm")]
impl Default for EmbeddingBackend {
    fn default() -> Self {
        Self::MiniLm
    }
}

#[cfg(not(feature = "minilm"))]
impl Default for EmbeddingBackend {
    fn default() -> Self {
        Self::Hashed
    }
}

impl EmbeddingBackend {
    /// `OpenAI` backend with the default embedding model.
    #[cfg(feature = "openai")]
    #[must_use]
    pub fn openai() -> Self {
        Self::OpenAi {
            model: DEFAULT_EMBEDDING_MODEL.to_owned(),
            dimensions: NonZeroUsize::new(DEFAULT_EMBEDDING_DIMENSIONS).expect("non-zero"),
        }
    }
}

impl FromStr for EmbeddingBackend {
    type Err = LearnerError;

    /// Accepts `minilm` (alias `local`), `hashed`, and `openai`.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            #[cfg(feature = "minilm")]
            "minilm" | "local" => Ok(Self::MiniLm),
            #[cfg(not(feature = "minilm"))]
            "minilm" | "local" => Err(feature_disabled("minilm")),
            "hashed" => Ok(Self::Hashed),
            #[cfg(feature = "openai")]
            "openai" => Ok(Self::openai()),
            #[cfg(not(feature = "openai"))]
            "openai" => Err(feature_disabled("openai")),
            other => Err(LearnerError::config(format!(
                "unknown embedding backend `{other}` (expected `minilm`, `hashed` or `openai`)"
            ))),
        }
    }
}

impl fmt::Display for EmbeddingBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            #[cfg(feature = "minilm")]
            Self::MiniLm => f.write_str("minilm"),
            Self::Hashed => f.write_str("hashed"),
            #[cfg(feature = "openai")]
            Self::OpenAi { model, .. } => write!(f, "openai:{model}"),
        }
    }
}

/// Optional LLM selection layer resolved at construction.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SelectionBackend {
    /// Every retrieved candidate is applied.
    #[default]
    None,
    /// `OpenAI` chat model filters candidates.
    #[cfg(feature = "openai")]
    OpenAi {
        /// Chat model name.
        model: String,
    },
}

impl SelectionBackend {
    /// `OpenAI` selection with the default chat model.
    #[cfg(feature = "openai")]
    #[must_use]
    pub fn openai() -> Self {
        Self::OpenAi {
            model: DEFAULT_CHAT_MODEL.to_owned(),
        }
    }
}

impl FromStr for SelectionBackend {
    type Err = LearnerError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            #[cfg(feature = "openai")]
            "openai" => Ok(Self::openai()),
            #[cfg(not(feature = "openai"))]
            "openai" => Err(feature_disabled("openai")),
            other => Err(LearnerError::config(format!(
                "unknown selection backend `{other}` (expected `none` or `openai`)"
            ))),
        }
    }
}

impl fmt::Display for SelectionBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("none"),
            #[cfg(feature = "openai")]
            Self::OpenAi { model } => write!(f, "openai:{model}"),
        }
    }
}

#[cfg(not(all(feature = "minilm", feature = "openai")))]
fn feature_disabled(backend: &str) -> LearnerError {
    LearnerError::config(format!(
        "backend `{backend}` is not compiled in (enable the `{backend}` cargo feature)"
    ))
}

/// Immutable learner configuration.
#[derive(Debug, Clone)]
pub struct LearnerConfig {
    embedding: EmbeddingBackend,
    storage_path: PathBuf,
    clear_on_start: bool,
    retriever: Retriever,
    selection: SelectionBackend,
    composer: PromptComposer,
    ephemeral: bool,
    verbose_selection: bool,
}

impl LearnerConfig {
    /// Starts a builder populated with defaults.
    #[must_use]
    pub fn builder() -> LearnerConfigBuilder {
        LearnerConfigBuilder::default()
    }

    /// Embedding backend.
    #[must_use]
    pub fn embedding(&self) -> &EmbeddingBackend {
        &self.embedding
    }

    /// Store file location (ignored when [`ephemeral`](Self::ephemeral)).
    #[must_use]
    pub fn storage_path(&self) -> &Path {
        &self.storage_path
    }

    /// Whether the store starts cleared.
    #[must_use]
    pub const fn clear_on_start(&self) -> bool {
        self.clear_on_start
    }

    /// Minimum similarity score.
    #[must_use]
    pub const fn similarity_threshold(&self) -> f32 {
        self.retriever.threshold()
    }

    /// Maximum matches per query.
    #[must_use]
    pub const fn max_matches(&self) -> NonZeroUsize {
        self.retriever.max_matches()
    }

    /// Selection backend.
    #[must_use]
    pub fn selection(&self) -> &SelectionBackend {
        &self.selection
    }

    /// Whether the store file is neither read nor written.
    #[must_use]
    pub const fn ephemeral(&self) -> bool {
        self.ephemeral
    }

    /// Whether selection diagnostics are logged at `info`.
    #[must_use]
    pub const fn verbose_selection(&self) -> bool {
        self.verbose_selection
    }

    pub(crate) const fn retriever(&self) -> Retriever {
        self.retriever
    }

    pub(crate) fn composer(&self) -> &PromptComposer {
        &self.composer
    }
}

impl Default for LearnerConfig {
    fn default() -> Self {
        Self {
            embedding: EmbeddingBackend::default(),
            storage_path: PathBuf::from(DEFAULT_STORAGE_PATH),
            clear_on_start: false,
            retriever: Retriever::new(
                DEFAULT_SIMILARITY_THRESHOLD,
                NonZeroUsize::new(DEFAULT_MAX_MATCHES).expect("non-zero"),
            )
            .expect("default threshold is valid"),
            selection: SelectionBackend::default(),
            composer: PromptComposer::default(),
            ephemeral: false,
            verbose_selection: false,
        }
    }
}

/// Builder for [`LearnerConfig`]; validation happens in [`build`](Self::build).
#[derive(Debug)]
pub struct LearnerConfigBuilder {
    embedding: EmbeddingBackend,
    storage_path: PathBuf,
    clear_on_start: bool,
    similarity_threshold: f32,
    max_matches: usize,
    selection: SelectionBackend,
    composer: PromptComposer,
    ephemeral: bool,
    verbose_selection: bool,
}

impl Default for LearnerConfigBuilder {
    fn default() -> Self {
        Self {
            embedding: EmbeddingBackend::default(),
            storage_path: PathBuf::from(DEFAULT_STORAGE_PATH),
            clear_on_start: false,
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            max_matches: DEFAULT_MAX_MATCHES,
            selection: SelectionBackend::default(),
            composer: PromptComposer::default(),
            ephemeral: false,
            verbose_selection: false,
        }
    }
}

impl LearnerConfigBuilder {
    /// Sets the embedding backend.
    #[must_use]
    pub fn embedding_backend(mut self, backend: EmbeddingBackend) -> Self {
        self.embedding = backend;
        self
    }

    /// Sets the store file location.
    #[must_use]
    pub fn storage_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.storage_path = path.into();
        self
    }

    /// Starts from an empty store, overwriting any existing file.
    #[must_use]
    pub fn clear_on_start(mut self, clear: bool) -> Self {
        self.clear_on_start = clear;
        self
    }

    /// Sets the minimum similarity score, in `[0, 1]`.
    #[must_use]
    pub fn similarity_threshold(mut self, threshold: f32) -> Self {
        self.similarity_threshold = threshold;
        self
    }

    /// Sets the maximum number of matches per query (at least 1).
    #[must_use]
    pub fn max_matches(mut self, max_matches: usize) -> Self {
        self.max_matches = max_matches;
        self
    }

    /// Sets the selection backend.
    #[must_use]
    pub fn selection_backend(mut self, backend: SelectionBackend) -> Self {
        self.selection = backend;
        self
    }

    /// Replaces the default feedback format with `formatter`.
    #[must_use]
    pub fn formatter(mut self, formatter: FeedbackFormatter) -> Self {
        self.composer = PromptComposer::with_formatter(formatter);
        self
    }

    /// Replaces the prompt composer outright (e.g. a template-based one).
    #[must_use]
    pub fn composer(mut self, composer: PromptComposer) -> Self {
        self.composer = composer;
        self
    }

    /// Keeps the store in memory only.
    #[must_use]
    pub fn ephemeral(mut self, ephemeral: bool) -> Self {
        self.ephemeral = ephemeral;
        self
    }

    /// Logs selection diagnostics at `info` instead of `debug`.
    #[must_use]
    pub fn verbose_selection(mut self, verbose: bool) -> Self {
        self.verbose_selection = verbose;
        self
    }

    /// Validates and freezes the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`LearnerError::Config`] when the threshold is outside `[0, 1]`,
    /// `max_matches` is zero, or the storage path is empty for a persisted store.
    pub fn build(self) -> LearnerResult<LearnerConfig> {
        let max_matches = NonZeroUsize::new(self.max_matches)
            .ok_or_else(|| LearnerError::config("max_matches must be at least 1"))?;
        let retriever = Retriever::new(self.similarity_threshold, max_matches)
            .map_err(|err| LearnerError::config(err.to_string()))?;
        if !self.ephemeral && self.storage_path.as_os_str().is_empty() {
            return Err(LearnerError::config("storage path must not be empty"));
        }

        Ok(LearnerConfig {
            embedding: self.embedding,
            storage_path: self.storage_path,
            clear_on_start: self.clear_on_start,
            retriever,
            selection: self.selection,
            composer: self.composer,
            ephemeral: self.ephemeral,
            verbose_selection: self.verbose_selection,
        })
    }
}
