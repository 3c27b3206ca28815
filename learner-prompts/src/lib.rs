//! Prompt templating and feedback composition for the self-learner.

#![warn(missing_docs, clippy::pedantic)]

pub mod composer;
pub mod template;

pub use composer::{FeedbackFormatter, PromptComposer};
pub use template::{PromptTemplate, TemplateError, TemplateResult};
