//! The [`SelfLearner`] facade.

use std::fmt;
use std::future::Future;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

#[cfg(feature = "openai")]
use learner_adapters::openai::{OpenAiChat, OpenAiConfig, OpenAiEmbedder};
#[cfg(feature = "minilm")]
use learner_memory::MiniLmEmbedder;
use learner_memory::{
    EmbeddingProvider, EmbeddingSpace, FeedbackRecord, FeedbackStore, HashedEmbedder, TaskFilter,
    embed_checked,
};
use tokio::runtime::{Builder, Handle, Runtime};
use tracing::{debug, info};

use crate::config::{EmbeddingBackend, LearnerConfig, SelectionBackend};
#[cfg(feature = "openai")]
use crate::selection::LlmSelector;
use crate::selection::{FeedbackSelector, select_feedback};
use crate::{LearnerError, LearnerResult};

/// Remembers human feedback on tasks and folds relevant feedback into the
/// prompts of new, similar tasks.
///
/// Every async operation has a blocking twin that runs the same future on a
/// private current-thread runtime. Blocking calls made from inside a tokio
/// runtime are rejected with a configuration error.
///
/// Store mutations run under a mutex that is never held across an `.await`,
/// so concurrent callers cannot lose each other's updates.
pub struct SelfLearner {
    config: LearnerConfig,
    embedder: Arc<dyn EmbeddingProvider>,
    selector: Option<Arc<dyn FeedbackSelector>>,
    store: Mutex<FeedbackStore>,
    runtime: OnceLock<Runtime>,
}

impl fmt::Debug for SelfLearner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelfLearner")
            .field("embedder", &self.embedder.name())
            .field("selector", &self.selector.as_ref().map(|s| s.name().to_owned()))
            .field("records", &self.len())
            .finish_non_exhaustive()
    }
}

impl SelfLearner {
    /// Builds a learner from `config`, resolving its backends.
    ///
    /// # Errors
    ///
    /// Returns [`LearnerError::Config`] when a remote backend lacks credentials
    /// and [`LearnerError::Format`] when an existing store file cannot be loaded.
    pub fn new(config: LearnerConfig) -> LearnerResult<Self> {
        SelfLearnerBuilder::new(config).build()
    }

    /// Starts a builder allowing backend overrides.
    #[must_use]
    pub fn builder(config: LearnerConfig) -> SelfLearnerBuilder {
        SelfLearnerBuilder::new(config)
    }

    /// Returns the configuration the learner was built with.
    #[must_use]
    pub fn config(&self) -> &LearnerConfig {
        &self.config
    }

    /// Store file location, or `None` when ephemeral.
    #[must_use]
    pub fn storage_path(&self) -> Option<&Path> {
        (!self.config.ephemeral()).then(|| self.config.storage_path())
    }

    /// Number of stored records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.store().len()
    }

    /// Returns `true` when no feedback is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.store().is_empty()
    }

    /// Records `feedback` for `task`.
    ///
    /// # Errors
    ///
    /// Returns [`LearnerError::Provider`] when the task cannot be embedded and
    /// [`LearnerError::Io`] when the store cannot be written. Nothing is stored
    /// on error.
    pub async fn save_feedback_async(
        &self,
        task: &str,
        feedback: &str,
    ) -> LearnerResult<FeedbackRecord> {
        const OPERATION: &str = "save_feedback";

        let embedding = embed_checked(self.embedder.as_ref(), task)
            .await
            .map_err(|err| LearnerError::provider(OPERATION, task, err))?;

        let mut store = self.store();
        let record = FeedbackRecord::new(task, feedback, store.space().embedder(), embedding);
        let record = store
            .append(record)
            .map_err(|err| LearnerError::store(OPERATION, err))?
            .clone();
        info!(records = store.len(), "feedback saved");
        Ok(record)
    }

    /// Returns `prompt` enhanced with stored feedback relevant to `task`.
    ///
    /// The prompt is returned unchanged when the store is empty or nothing
    /// clears the similarity threshold.
    ///
    /// # Errors
    ///
    /// Returns [`LearnerError::Provider`] when the task cannot be embedded.
    /// Selection failures are recovered by applying the top match.
    pub async fn apply_feedback_async(&self, task: &str, prompt: &str) -> LearnerResult<String> {
        if self.is_empty() {
            return Ok(prompt.to_owned());
        }

        let query = embed_checked(self.embedder.as_ref(), task)
            .await
            .map_err(|err| LearnerError::provider("apply_feedback", task, err))?;

        let candidates = self
            .config
            .retriever()
            .retrieve(&query, self.store().records());
        debug!(candidates = candidates.len(), "similar feedback retrieved");
        if candidates.is_empty() {
            return Ok(prompt.to_owned());
        }

        let selected = select_feedback(
            self.selector.as_deref(),
            task,
            candidates,
            self.config.verbose_selection(),
        )
        .await;

        let feedback: Vec<String> = selected
            .iter()
            .map(|candidate| candidate.record().feedback().to_owned())
            .collect();
        Ok(self.config.composer().compose(prompt, &feedback))
    }

    /// Blocking form of [`save_feedback_async`](Self::save_feedback_async).
    ///
    /// # Errors
    ///
    /// As for the async form; additionally [`LearnerError::Config`] when called
    /// from inside a tokio runtime.
    pub fn save_feedback(&self, task: &str, feedback: &str) -> LearnerResult<FeedbackRecord> {
        self.block_on("save_feedback", self.save_feedback_async(task, feedback))
    }

    /// Blocking form of [`apply_feedback_async`](Self::apply_feedback_async).
    ///
    /// # Errors
    ///
    /// As for the async form; additionally [`LearnerError::Config`] when called
    /// from inside a tokio runtime.
    pub fn apply_feedback(&self, task: &str, prompt: &str) -> LearnerResult<String> {
        self.block_on("apply_feedback", self.apply_feedback_async(task, prompt))
    }

    /// Lists every record with its index.
    #[must_use]
    pub fn list_all_feedback(&self) -> Vec<(usize, FeedbackRecord)> {
        self.store().list(TaskFilter::All)
    }

    /// Lists records whose task equals `task` exactly (case-sensitive).
    #[must_use]
    pub fn list_feedback(&self, task: &str) -> Vec<(usize, FeedbackRecord)> {
        self.store().list(TaskFilter::Exact(task))
    }

    /// Lists records whose task contains `substring` (case-sensitive).
    #[must_use]
    pub fn list_feedback_substring(&self, substring: &str) -> Vec<(usize, FeedbackRecord)> {
        self.store().list(TaskFilter::Substring(substring))
    }

    /// Writes the store to `path` in the store file format.
    ///
    /// # Errors
    ///
    /// Returns [`LearnerError::Io`] when the file cannot be written.
    pub fn export_memory(&self, path: impl AsRef<Path>) -> LearnerResult<()> {
        self.store()
            .export(path.as_ref())
            .map_err(|err| LearnerError::store("export_memory", err))
    }

    /// Replaces the store with the records in `path`; returns how many were loaded.
    ///
    /// # Errors
    ///
    /// Returns [`LearnerError::Format`] when the file is absent, malformed, or
    /// was produced by a different embedder or dimensionality.
    pub fn import_memory(&self, path: impl AsRef<Path>) -> LearnerResult<usize> {
        self.store()
            .import(path.as_ref())
            .map_err(|err| LearnerError::store("import_memory", err))
    }

    /// Removes the record at `index` (0-based).
    ///
    /// # Errors
    ///
    /// Returns [`LearnerError::Index`] without mutating anything when `index`
    /// is out of range.
    pub fn remove_feedback(&self, index: usize) -> LearnerResult<FeedbackRecord> {
        self.store()
            .remove(index)
            .map_err(|err| LearnerError::store("remove_feedback", err))
    }

    /// Removes every record whose task equals `task`; returns how many went.
    ///
    /// # Errors
    ///
    /// Returns [`LearnerError::Io`] when the store cannot be written.
    pub fn remove_feedback_for_task(&self, task: &str) -> LearnerResult<usize> {
        self.store()
            .remove_for_task(task)
            .map_err(|err| LearnerError::store("remove_feedback_for_task", err))
    }

    /// Clears the store in memory and on disk.
    ///
    /// # Errors
    ///
    /// Returns [`LearnerError::Io`] when the store cannot be written.
    pub fn reset_memory(&self) -> LearnerResult<()> {
        self.store()
            .reset()
            .map_err(|err| LearnerError::store("reset_memory", err))
    }

    fn store(&self) -> MutexGuard<'_, FeedbackStore> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn block_on<T>(
        &self,
        operation: &'static str,
        future: impl Future<Output = LearnerResult<T>>,
    ) -> LearnerResult<T> {
        if Handle::try_current().is_ok() {
            return Err(LearnerError::config(format!(
                "{operation} blocks; use {operation}_async inside an async runtime"
            )));
        }

        if self.runtime.get().is_none() {
            let runtime = Builder::new_current_thread().enable_all().build()?;
            // A concurrent caller may have won the race; its runtime is kept.
            let _ = self.runtime.set(runtime);
        }
        match self.runtime.get() {
            Some(runtime) => runtime.block_on(future),
            None => Err(LearnerError::config("blocking runtime unavailable")),
        }
    }
}

impl Drop for SelfLearner {
    fn drop(&mut self) {
        // Dropping a runtime blocks, which panics inside async contexts.
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

/// Builder resolving the configured backends, with optional overrides.
pub struct SelfLearnerBuilder {
    config: LearnerConfig,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    selector: Option<Arc<dyn FeedbackSelector>>,
}

impl fmt::Debug for SelfLearnerBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelfLearnerBuilder")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl SelfLearnerBuilder {
    /// Starts from `config`.
    #[must_use]
    pub fn new(config: LearnerConfig) -> Self {
        Self {
            config,
            embedder: None,
            selector: None,
        }
    }

    /// Uses `embedder` instead of the configured embedding backend.
    #[must_use]
    pub fn embedding_provider(mut self, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Uses `selector` instead of the configured selection backend.
    #[must_use]
    pub fn selector(mut self, selector: Arc<dyn FeedbackSelector>) -> Self {
        self.selector = Some(selector);
        self
    }

    /// Resolves backends and opens the store.
    ///
    /// # Errors
    ///
    /// Returns [`LearnerError::Config`] when a backend cannot be set up,
    /// [`LearnerError::Format`] when the existing store cannot be loaded or
    /// was written by another embedder, and [`LearnerError::Io`] when
    /// clearing the store on start fails.
    pub fn build(self) -> LearnerResult<SelfLearner> {
        let embedder = match self.embedder {
            Some(embedder) => embedder,
            None => resolve_embedder(self.config.embedding())?,
        };
        let selector = match self.selector {
            Some(selector) => Some(selector),
            None => resolve_selector(self.config.selection())?,
        };

        let space = EmbeddingSpace::of(embedder.as_ref());
        let store = if self.config.ephemeral() {
            FeedbackStore::ephemeral(space)
        } else if self.config.clear_on_start() {
            FeedbackStore::create(self.config.storage_path(), space)
                .map_err(|err| LearnerError::store("clear_on_start", err))?
        } else {
            FeedbackStore::open(self.config.storage_path(), space)
                .map_err(|err| LearnerError::store("load_memory", err))?
        };

        info!(
            embedding = %store.space(),
            selection = selector.as_ref().map_or("none", |s| s.name()),
            records = store.len(),
            ephemeral = self.config.ephemeral(),
            "self-learner ready"
        );

        Ok(SelfLearner {
            config: self.config,
            embedder,
            selector,
            store: Mutex::new(store),
            runtime: OnceLock::new(),
        })
    }
}

fn resolve_embedder(backend: &EmbeddingBackend) -> LearnerResult<Arc<dyn EmbeddingProvider>> {
    match backend {
        #[cfg(feature = "minilm")]
        EmbeddingBackend::MiniLm => {
            let embedder =
                MiniLmEmbedder::new(None).map_err(|err| LearnerError::config(err.to_string()))?;
            Ok(Arc::new(embedder))
        }
        EmbeddingBackend::Hashed => Ok(Arc::new(HashedEmbedder::default())),
        #[cfg(feature = "openai")]
        EmbeddingBackend::OpenAi { model, dimensions } => {
            let embedder = OpenAiEmbedder::new(OpenAiConfig::from_env(model.clone()), *dimensions)
                .map_err(|err| LearnerError::config(err.to_string()))?;
            Ok(Arc::new(embedder))
        }
    }
}

fn resolve_selector(
    backend: &SelectionBackend,
) -> LearnerResult<Option<Arc<dyn FeedbackSelector>>> {
    match backend {
        SelectionBackend::None => Ok(None),
        #[cfg(feature = "openai")]
        SelectionBackend::OpenAi { model } => {
            let chat = OpenAiChat::new(OpenAiConfig::from_env(model.clone()))
                .map_err(|err| LearnerError::config(err.to_string()))?;
            Ok(Some(Arc::new(LlmSelector::new(Arc::new(chat)))))
        }
    }
}
