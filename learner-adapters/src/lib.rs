//! Hosted model adapters used by the self-learner.
//!
//! [`chat`] defines the completion interface consumed by the feedback
//! selection layer; [`openai`] implements it together with a remote
//! [`EmbeddingProvider`](learner_memory::EmbeddingProvider).

#![warn(missing_docs, clippy::pedantic)]

pub mod chat;
pub mod openai;

mod http_client;
