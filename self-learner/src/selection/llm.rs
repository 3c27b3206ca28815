//! Selector that asks a chat model which candidates apply.

use std::collections::HashMap;
use std::fmt::{self, Write as _};
use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use learner_adapters::chat::{ChatMessage, ChatModel, ChatRequest};
use learner_memory::ScoredFeedback;
use learner_prompts::PromptTemplate;
use serde::Deserialize;

use super::{FeedbackSelector, SelectionError};

const SYSTEM_PROMPT: &str = "You decide which stored human feedback should be applied to a new task. \
Each candidate was retrieved because its original task is worded similarly to the new one, \
but similar wording does not always mean the same intent. Keep only feedback that genuinely \
applies to the new task.\n\
Respond with JSON only, in the form {\"selected\": [<candidate numbers>]}. \
Use an empty list when nothing applies.";

const USER_TEMPLATE: &str = "New task: {{task}}\n\nCandidates:\n{{candidates}}";

static USER_PROMPT: LazyLock<PromptTemplate> = LazyLock::new(|| {
    PromptTemplate::parse(USER_TEMPLATE).expect("selection template is valid")
});

/// Selector backed by a single chat completion.
pub struct LlmSelector {
    model: Arc<dyn ChatModel>,
}

impl fmt::Debug for LlmSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmSelector")
            .field("provider", &self.model.provider())
            .field("model", &self.model.model())
            .finish()
    }
}

impl LlmSelector {
    /// Creates a selector that consults `model`.
    #[must_use]
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }
}

#[async_trait]
impl FeedbackSelector for LlmSelector {
    fn name(&self) -> &str {
        self.model.provider()
    }

    async fn select(
        &self,
        task: &str,
        candidates: &[ScoredFeedback],
    ) -> Result<Vec<usize>, SelectionError> {
        let listing = render_candidates(candidates);
        let vars = HashMap::from([("task", task), ("candidates", listing.as_str())]);
        let user = USER_PROMPT.render(&vars)?;

        let request = ChatRequest::new(vec![ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(user)])?
            .with_temperature(0.0)
            .with_max_tokens(200);

        let response = self.model.complete(request).await?;
        parse_selection(&response, candidates.len())
    }
}

fn render_candidates(candidates: &[ScoredFeedback]) -> String {
    let mut listing = String::new();
    for (position, candidate) in candidates.iter().enumerate() {
        let _ = writeln!(
            listing,
            "[{position}] (score {:.2}) task: {} | feedback: {}",
            candidate.score(),
            candidate.record().task(),
            candidate.record().feedback(),
        );
    }
    listing
}

#[derive(Debug, Deserialize)]
struct SelectionResponse {
    selected: Vec<usize>,
}

/// Decodes the first JSON object in `response` and validates its indices.
///
/// Text around the object (code fences, prose) is ignored. Kept positions are
/// de-duplicated and returned in candidate order.
fn parse_selection(response: &str, candidate_count: usize) -> Result<Vec<usize>, SelectionError> {
    let start = response
        .find('{')
        .ok_or_else(|| SelectionError::InvalidResponse("no JSON object in response".into()))?;

    let parsed = serde_json::Deserializer::from_str(&response[start..])
        .into_iter::<SelectionResponse>()
        .next()
        .ok_or_else(|| SelectionError::InvalidResponse("no JSON object in response".into()))?
        .map_err(|err| SelectionError::InvalidResponse(err.to_string()))?;

    if let Some(bad) = parsed.selected.iter().find(|index| **index >= candidate_count) {
        return Err(SelectionError::InvalidResponse(format!(
            "candidate {bad} does not exist ({candidate_count} offered)"
        )));
    }

    let mut selected = parsed.selected;
    selected.sort_unstable();
    selected.dedup();
    Ok(selected)
}
