//! Folds selected feedback into a system prompt.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, LazyLock};

use crate::template::{PromptTemplate, TemplateError, TemplateResult};

/// Caller-supplied formatter: `(original_prompt, feedback) -> enhanced_prompt`.
pub type FeedbackFormatter = Arc<dyn Fn(&str, &[String]) -> String + Send + Sync>;

/// Template variable holding the original prompt.
pub const PROMPT_VAR: &str = "prompt";
/// Template variable holding the bulleted feedback list.
pub const FEEDBACK_VAR: &str = "feedback";

const DEFAULT_TEMPLATE: &str =
    "{{prompt}}\n\nApply the following feedback from previous similar tasks:\n{{feedback}}";

static DEFAULT: LazyLock<PromptTemplate> = LazyLock::new(|| {
    PromptTemplate::parse(DEFAULT_TEMPLATE).expect("default feedback template is valid")
});

#[derive(Clone)]
enum Format {
    Default,
    Template(PromptTemplate),
    Custom(FeedbackFormatter),
}

/// Deterministic prompt composer.
///
/// With no feedback the original prompt is returned unchanged. Otherwise the
/// feedback items are rendered, in order, after the prompt.
#[derive(Clone)]
pub struct PromptComposer {
    format: Format,
}

impl fmt::Debug for PromptComposer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let format = match &self.format {
            Format::Default => "default",
            Format::Template(_) => "template",
            Format::Custom(_) => "custom",
        };
        f.debug_struct("PromptComposer")
            .field("format", &format)
            .finish()
    }
}

impl Default for PromptComposer {
    fn default() -> Self {
        Self {
            format: Format::Default,
        }
    }
}

impl PromptComposer {
    /// Composer using the built-in format.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Composer delegating to a caller-supplied formatter.
    #[must_use]
    pub fn with_formatter(formatter: FeedbackFormatter) -> Self {
        Self {
            format: Format::Custom(formatter),
        }
    }

    /// Composer rendering a template over `{{prompt}}` and `{{feedback}}`.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::MissingVariable`] naming the first variable the
    /// composer cannot supply.
    pub fn with_template(template: PromptTemplate) -> TemplateResult<Self> {
        if let Some(unknown) = template
            .variables()
            .into_iter()
            .find(|name| *name != PROMPT_VAR && *name != FEEDBACK_VAR)
        {
            return Err(TemplateError::MissingVariable {
                name: unknown.to_owned(),
            });
        }
        Ok(Self {
            format: Format::Template(template),
        })
    }

    /// Returns `original_prompt` augmented with `feedback`.
    #[must_use]
    pub fn compose(&self, original_prompt: &str, feedback: &[String]) -> String {
        if feedback.is_empty() {
            return original_prompt.to_owned();
        }

        match &self.format {
            Format::Default => render(&DEFAULT, original_prompt, feedback),
            Format::Template(template) => render(template, original_prompt, feedback),
            Format::Custom(formatter) => formatter(original_prompt, feedback),
        }
    }
}

fn render(template: &PromptTemplate, original_prompt: &str, feedback: &[String]) -> String {
    let bullets = feedback
        .iter()
        .map(|item| format!("- {item}"))
        .collect::<Vec<_>>()
        .join("\n");
    let vars = HashMap::from([(PROMPT_VAR, original_prompt), (FEEDBACK_VAR, bullets.as_str())]);
    // Variables were validated when the composer was built.
    template
        .render(&vars)
        .unwrap_or_else(|_| format!("{original_prompt}\n\n{bullets}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feedback(items: &[&str]) -> Vec<String> {
        items.iter().map(|item| (*item).to_owned()).collect()
    }

    #[test]
    fn empty_feedback_returns_prompt_unchanged() {
        let composer = PromptComposer::new();
        assert_eq!(composer.compose("You are a copywriter.", &[]), "You are a copywriter.");
    }

    #[test]
    fn default_format_lists_feedback_in_order() {
        let composer = PromptComposer::new();
        let prompt = composer.compose("base prompt", &feedback(&["be concise", "add a CTA"]));
        assert_eq!(
            prompt,
            "base prompt\n\nApply the following feedback from previous similar tasks:\n- be concise\n- add a CTA"
        );
    }

    #[test]
    fn custom_formatter_receives_prompt_and_feedback() {
        let composer = PromptComposer::with_formatter(Arc::new(|prompt: &str, items: &[String]| {
            format!("{prompt} | {}", items.join(" / "))
        }));
        assert_eq!(composer.compose("base", &feedback(&["a", "b"])), "base | a / b");
    }

    #[test]
    fn template_format_is_validated() {
        let ok = PromptTemplate::parse("{{feedback}}\n---\n{{prompt}}").unwrap();
        let composer = PromptComposer::with_template(ok).unwrap();
        assert_eq!(composer.compose("base", &feedback(&["x"])), "- x\n---\nbase");

        let unknown = PromptTemplate::parse("{{prompt}} {{task}}").unwrap();
        assert!(matches!(
            PromptComposer::with_template(unknown),
            Err(TemplateError::MissingVariable { name }) if name == "task"
        ));
    }
}
