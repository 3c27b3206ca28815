//! Optional pass that filters retrieved feedback down to what applies.
//!
//! Selection is best effort: [`select_feedback`] never fails. When the
//! selector errors or answers with something unusable, the top-scoring
//! candidate is applied instead.

#[cfg(feature = "openai")]
mod llm;

use async_trait::async_trait;
#[cfg(feature = "openai")]
use learner_adapters::chat::ModelError;
use learner_memory::ScoredFeedback;
use learner_prompts::TemplateError;
use thiserror::Error;
use tracing::{debug, info, warn};

#[cfg(feature = "openai")]
pub use llm::LlmSelector;

/// Failures a selector may report. All of them trigger the top-1 fallback.
#[derive(Debug, Error)]
pub enum SelectionError {
    /// The chat model call failed.
    #[cfg(feature = "openai")]
    #[error("selection model failed: {0}")]
    Model(#[from] ModelError),
    /// The selector answered, but not with a usable selection.
    #[error("unusable selection response: {0}")]
    InvalidResponse(String),
    /// The selection prompt could not be rendered.
    #[error("selection prompt failed: {0}")]
    Prompt(#[from] TemplateError),
}

/// Capability implemented by selection backends.
#[async_trait]
pub trait FeedbackSelector: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &str;

    /// Returns the positions (into `candidates`) of feedback worth applying to `task`.
    async fn select(
        &self,
        task: &str,
        candidates: &[ScoredFeedback],
    ) -> Result<Vec<usize>, SelectionError>;
}

/// Applies `selector` to `candidates`, falling back to the top match on failure.
///
/// Without a selector every candidate is kept.
pub(crate) async fn select_feedback(
    selector: Option<&dyn FeedbackSelector>,
    task: &str,
    candidates: Vec<ScoredFeedback>,
    verbose: bool,
) -> Vec<ScoredFeedback> {
    let Some(selector) = selector else {
        return candidates;
    };
    if candidates.is_empty() {
        return candidates;
    }

    let scores: Vec<String> = candidates
        .iter()
        .map(|candidate| format!("{:.3}", candidate.score()))
        .collect();

    match selector.select(task, &candidates).await {
        Ok(kept) => {
            if verbose {
                info!(selector = selector.name(), ?scores, ?kept, "feedback selection");
            } else {
                debug!(selector = selector.name(), ?scores, ?kept, "feedback selection");
            }
            candidates
                .into_iter()
                .enumerate()
                .filter(|(position, _)| kept.contains(position))
                .map(|(_, candidate)| candidate)
                .collect()
        }
        Err(err) => {
            warn!(
                selector = selector.name(),
                ?scores,
                error = %err,
                "feedback selection failed; applying top match"
            );
            candidates.into_iter().take(1).collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use learner_memory::{EmbeddingVector, FeedbackRecord, Retriever};
    use std::num::NonZeroUsize;

    use super::*;

    pub(crate) fn candidates() -> Vec<ScoredFeedback> {
        let records = vec![
            record("Write a marketing email", "Keep it short", 1.0),
            record("Write an email about shipping", "Apologize clearly", 0.9),
            record("Write an email to HR", "Be formal", 0.8),
        ];
        let query = EmbeddingVector::new(vec![1.0, 0.0]).unwrap();
        Retriever::new(0.0, NonZeroUsize::new(10).unwrap())
            .unwrap()
            .retrieve(&query, &records)
    }

    fn record(task: &str, feedback: &str, x: f32) -> FeedbackRecord {
        let embedding = EmbeddingVector::new(vec![x, 1.0 - x]).unwrap();
        FeedbackRecord::new(task, feedback, "test/fixed", embedding)
    }

    pub(crate) fn feedback(selected: &[ScoredFeedback]) -> Vec<&str> {
        selected.iter().map(|c| c.record().feedback()).collect()
    }

    struct Fixed(Option<Vec<usize>>);

    #[async_trait]
    impl FeedbackSelector for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn select(
            &self,
            _task: &str,
            _candidates: &[ScoredFeedback],
        ) -> Result<Vec<usize>, SelectionError> {
            self.0
                .clone()
                .ok_or_else(|| SelectionError::InvalidResponse("nothing usable".into()))
        }
    }

    #[tokio::test]
    async fn keeps_only_selected_candidates() {
        let kept = select_feedback(Some(&Fixed(Some(vec![1]))), "task", candidates(), false).await;
        assert_eq!(feedback(&kept), ["Apologize clearly"]);
    }

    #[tokio::test]
    async fn empty_selection_is_honoured() {
        let kept = select_feedback(Some(&Fixed(Some(Vec::new()))), "task", candidates(), true).await;
        assert!(kept.is_empty());
    }

    #[tokio::test]
    async fn failures_fall_back_to_top_match() {
        let kept = select_feedback(Some(&Fixed(None)), "task", candidates(), false).await;
        assert_eq!(feedback(&kept), ["Keep it short"]);
    }

    #[tokio::test]
    async fn without_selector_all_candidates_are_kept() {
        let kept = select_feedback(None, "task", candidates(), false).await;
        assert_eq!(kept.len(), 3);
    }
}
