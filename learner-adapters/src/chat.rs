//! Chat-completion interface consumed by the feedback selection layer.

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

/// Result alias for model calls.
pub type ModelResult<T> = Result<T, ModelError>;

/// Failures raised while configuring or calling a hosted model.
#[derive(Debug, Error)]
pub enum ModelError {
    /// No credentials were available for the provider.
    #[error("no API key configured for {provider} (set {env})")]
    MissingApiKey {
        /// Provider that needs the key.
        provider: &'static str,
        /// Environment variable consulted for it.
        env: &'static str,
    },
    /// The configured endpoint is not a usable URL.
    #[error("invalid endpoint `{url}`: {reason}")]
    Endpoint {
        /// Offending URL.
        url: String,
        /// Why it was rejected.
        reason: String,
    },
    /// A chat request was built without messages.
    #[error("chat request must contain at least one message")]
    EmptyConversation,
    /// The provider could not be reached or did not answer in time.
    #[error("{operation}: {reason}")]
    Transport {
        /// Call that failed, e.g. `"OpenAI embeddings"`.
        operation: &'static str,
        /// Network, TLS, or timeout detail.
        reason: String,
    },
    /// The provider answered with a non-success status.
    #[error("{operation} returned HTTP {status}: {body}")]
    Status {
        /// Call that failed.
        operation: &'static str,
        /// HTTP status code.
        status: u16,
        /// Response body, as sent by the provider.
        body: String,
    },
    /// The provider's answer did not have the expected shape.
    #[error("{operation} response could not be decoded: {reason}")]
    Decode {
        /// Call that failed.
        operation: &'static str,
        /// What was wrong with the body.
        reason: String,
    },
}

/// Speaker of a [`ChatMessage`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Instructions steering the model.
    System,
    /// The question put to the model.
    User,
}

impl Role {
    /// Wire name of the role.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
        }
    }
}

/// One turn of a conversation. Serializes as `{"role": .., "content": ..}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    role: Role,
    content: String,
}

impl ChatMessage {
    /// System instruction.
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    /// User turn.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Speaker of the message.
    #[must_use]
    pub const fn role(&self) -> Role {
        self.role
    }

    /// Message text.
    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }
}

/// A single, non-streaming completion request.
#[derive(Clone, Debug, PartialEq)]
pub struct ChatRequest {
    messages: Vec<ChatMessage>,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
}

impl ChatRequest {
    /// Creates a request from `messages`, sent in order.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::EmptyConversation`] if `messages` is empty.
    pub fn new(messages: Vec<ChatMessage>) -> ModelResult<Self> {
        if messages.is_empty() {
            return Err(ModelError::EmptyConversation);
        }
        Ok(Self {
            messages,
            temperature: None,
            max_tokens: None,
        })
    }

    /// Sets the sampling temperature.
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Caps the length of the answer.
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Messages in send order.
    #[must_use]
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Sampling temperature, if set.
    #[must_use]
    pub const fn temperature(&self) -> Option<f32> {
        self.temperature
    }

    /// Answer length cap, if set.
    #[must_use]
    pub const fn max_tokens(&self) -> Option<u32> {
        self.max_tokens
    }
}

/// A hosted chat model.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Provider identifier used in logs, e.g. `"openai"`.
    fn provider(&self) -> &str;

    /// Model name sent with each request.
    fn model(&self) -> &str;

    /// Runs one completion and returns the assistant's text.
    async fn complete(&self, request: ChatRequest) -> ModelResult<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_conversations_are_rejected() {
        assert!(matches!(
            ChatRequest::new(Vec::new()),
            Err(ModelError::EmptyConversation)
        ));
    }

    #[test]
    fn messages_serialize_in_wire_shape() {
        let json = serde_json::to_value(ChatMessage::system("pick feedback")).unwrap();
        assert_eq!(json, serde_json::json!({"role": "system", "content": "pick feedback"}));
        assert_eq!(ChatMessage::user("hi").role().as_str(), "user");
    }

    #[test]
    fn status_errors_name_the_call() {
        let err = ModelError::Status {
            operation: "OpenAI chat",
            status: 401,
            body: "invalid key".into(),
        };
        assert_eq!(err.to_string(), "OpenAI chat returned HTTP 401: invalid key");
    }
}
