//! `OpenAI` chat-completion and embedding adapters.

use std::num::NonZeroUsize;
use std::{env, fmt, time::Duration};

use async_trait::async_trait;
use hyper::Uri;
use learner_memory::{EmbeddingProvider, EmbeddingVector, MemoryError, MemoryResult};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::chat::{ChatMessage, ChatModel, ChatRequest, ModelError, ModelResult};
use crate::http_client::JsonEndpoint;

/// Environment variable the API key is read from.
pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Chat model used by default for feedback selection.
pub const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";

/// Embedding model used by default for the remote backend.
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// Output dimensionality of [`DEFAULT_EMBEDDING_MODEL`].
pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = 1536;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/";
const PROVIDER: &str = "openai";

/// Connection settings shared by the `OpenAI` adapters.
#[derive(Clone)]
pub struct OpenAiConfig {
    api_key: Option<String>,
    model: String,
    base_url: String,
    timeout: Duration,
}

impl fmt::Debug for OpenAiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiConfig")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl OpenAiConfig {
    /// Settings for `model` without credentials.
    #[must_use]
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            api_key: None,
            model: model.into(),
            base_url: DEFAULT_BASE_URL.to_owned(),
            timeout: Duration::from_secs(60),
        }
    }

    /// Settings for `model` with the key taken from [`OPENAI_API_KEY_ENV`].
    ///
    /// A blank variable counts as unset.
    #[must_use]
    pub fn from_env(model: impl Into<String>) -> Self {
        let mut config = Self::new(model);
        config.api_key = env::var(OPENAI_API_KEY_ENV)
            .ok()
            .filter(|key| !key.trim().is_empty());
        config
    }

    /// Points the adapters at an `OpenAI`-compatible server.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::Endpoint`] unless `base_url` is an absolute
    /// `http` or `https` URL.
    pub fn with_base_url(mut self, base_url: impl AsRef<str>) -> ModelResult<Self> {
        let mut base = base_url.as_ref().trim().to_owned();
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(ModelError::Endpoint {
                url: base,
                reason: "scheme must be http or https".into(),
            });
        }
        if !base.ends_with('/') {
            base.push('/');
        }
        self.base_url = base;
        Ok(self)
    }

    /// Sets the per-request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Supplies the API key explicitly.
    #[must_use]
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Configured model name.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self, path: &str) -> ModelResult<JsonEndpoint> {
        let api_key = self.api_key.clone().ok_or(ModelError::MissingApiKey {
            provider: "OpenAI",
            env: OPENAI_API_KEY_ENV,
        })?;
        let url = format!("{}{path}", self.base_url);
        let uri = url.parse::<Uri>().map_err(|err| ModelError::Endpoint {
            reason: err.to_string(),
            url,
        })?;
        Ok(JsonEndpoint::new(uri, api_key, self.timeout))
    }
}

/// Chat model behind `v1/chat/completions`.
pub struct OpenAiChat {
    endpoint: JsonEndpoint,
    model: String,
}

impl fmt::Debug for OpenAiChat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiChat")
            .field("model", &self.model)
            .field("endpoint", self.endpoint.uri())
            .finish_non_exhaustive()
    }
}

impl OpenAiChat {
    /// Creates the adapter.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::MissingApiKey`] without credentials and
    /// [`ModelError::Endpoint`] when the URL cannot be parsed.
    pub fn new(config: OpenAiConfig) -> ModelResult<Self> {
        Ok(Self {
            endpoint: config.endpoint("v1/chat/completions")?,
            model: config.model,
        })
    }

    fn payload<'a>(&'a self, request: &'a ChatRequest) -> CompletionPayload<'a> {
        CompletionPayload {
            model: &self.model,
            messages: request.messages(),
            temperature: request.temperature(),
            max_tokens: request.max_tokens(),
        }
    }
}

#[async_trait]
impl ChatModel for OpenAiChat {
    fn provider(&self) -> &str {
        PROVIDER
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: ChatRequest) -> ModelResult<String> {
        let completion: Completion = self
            .endpoint
            .post("OpenAI chat", &self.payload(&request))
            .await?;
        completion.into_text()
    }
}

/// Remote embedding backend behind `v1/embeddings`.
pub struct OpenAiEmbedder {
    endpoint: JsonEndpoint,
    model: String,
    dimensions: NonZeroUsize,
}

impl fmt::Debug for OpenAiEmbedder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiEmbedder")
            .field("model", &self.model)
            .field("dimensions", &self.dimensions)
            .finish_non_exhaustive()
    }
}

impl OpenAiEmbedder {
    /// Creates an embedder whose model yields `dimensions`-long vectors.
    ///
    /// `text-embedding-3` models are asked for exactly `dimensions` values;
    /// older models always answer at their native size.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::MissingApiKey`] without credentials and
    /// [`ModelError::Endpoint`] when the URL cannot be parsed.
    pub fn new(config: OpenAiConfig, dimensions: NonZeroUsize) -> ModelResult<Self> {
        Ok(Self {
            endpoint: config.endpoint("v1/embeddings")?,
            model: config.model,
            dimensions,
        })
    }

    fn payload<'a>(&'a self, text: &'a str) -> EmbeddingPayload<'a> {
        EmbeddingPayload {
            model: &self.model,
            input: text,
            dimensions: self
                .model
                .starts_with("text-embedding-3")
                .then_some(self.dimensions.get()),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedder {
    fn name(&self) -> &str {
        PROVIDER
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dimensions.get()
    }

    async fn embed(&self, text: &str) -> MemoryResult<EmbeddingVector> {
        let embeddings: Embeddings = self
            .endpoint
            .post("OpenAI embeddings", &self.payload(text))
            .await
            .map_err(|err| MemoryError::provider(PROVIDER, err.to_string()))?;

        let values = embeddings
            .data
            .into_iter()
            .next()
            .map(|item| item.embedding)
            .ok_or_else(|| MemoryError::provider(PROVIDER, "response carried no embedding"))?;
        debug!(model = %self.model, dimensions = values.len(), "embedding received");
        EmbeddingVector::new(values).map_err(|err| MemoryError::provider(PROVIDER, err.to_string()))
    }
}

#[derive(Serialize)]
struct CompletionPayload<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Deserialize)]
struct Completion {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: Option<Reply>,
}

#[derive(Deserialize)]
struct Reply {
    content: Option<String>,
}

impl Completion {
    fn into_text(self) -> ModelResult<String> {
        self.choices
            .into_iter()
            .find_map(|choice| choice.message.and_then(|reply| reply.content))
            .ok_or(ModelError::Decode {
                operation: "OpenAI chat",
                reason: "no choice carried text".into(),
            })
    }
}

#[derive(Serialize)]
struct EmbeddingPayload<'a> {
    model: &'a str,
    input: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Deserialize)]
struct Embeddings {
    #[serde(default)]
    data: Vec<EmbeddingItem>,
}

#[derive(Deserialize)]
struct EmbeddingItem {
    embedding: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_needs_a_scheme_and_gains_a_slash() {
        let err = OpenAiConfig::new(DEFAULT_CHAT_MODEL)
            .with_base_url("api.openai.com")
            .unwrap_err();
        assert!(matches!(err, ModelError::Endpoint { .. }));

        let config = OpenAiConfig::new(DEFAULT_CHAT_MODEL)
            .with_base_url("http://localhost:8080/compat")
            .unwrap();
        assert_eq!(config.base_url, "http://localhost:8080/compat/");
    }

    #[test]
    fn adapters_need_a_key() {
        let err = OpenAiChat::new(OpenAiConfig::new(DEFAULT_CHAT_MODEL)).unwrap_err();
        assert!(matches!(err, ModelError::MissingApiKey { env: OPENAI_API_KEY_ENV, .. }));

        let dimensions = NonZeroUsize::new(DEFAULT_EMBEDDING_DIMENSIONS).unwrap();
        let err = OpenAiEmbedder::new(OpenAiConfig::new(DEFAULT_EMBEDDING_MODEL), dimensions)
            .unwrap_err();
        assert!(err.to_string().contains(OPENAI_API_KEY_ENV));
    }

    #[test]
    fn debug_output_hides_the_key() {
        let rendered = format!("{:?}", OpenAiConfig::new(DEFAULT_CHAT_MODEL).with_api_key("sk-secret"));
        assert!(!rendered.contains("sk-secret"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn completion_payload_matches_the_wire_format() {
        let chat = OpenAiChat::new(OpenAiConfig::new("gpt-test").with_api_key("k")).unwrap();
        let request = ChatRequest::new(vec![ChatMessage::system("pick"), ChatMessage::user("task")])
            .unwrap()
            .with_temperature(0.0);

        let json = serde_json::to_value(chat.payload(&request)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "model": "gpt-test",
                "messages": [
                    {"role": "system", "content": "pick"},
                    {"role": "user", "content": "task"}
                ],
                "temperature": 0.0
            })
        );
    }

    #[test]
    fn embedding_payload_requests_the_configured_size() {
        let config = OpenAiConfig::new(DEFAULT_EMBEDDING_MODEL).with_api_key("k");
        let embedder = OpenAiEmbedder::new(config, NonZeroUsize::new(256).unwrap()).unwrap();
        assert_eq!(
            serde_json::to_value(embedder.payload("task")).unwrap(),
            serde_json::json!({"model": DEFAULT_EMBEDDING_MODEL, "input": "task", "dimensions": 256})
        );

        let legacy = OpenAiConfig::new("text-embedding-ada-002").with_api_key("k");
        let embedder = OpenAiEmbedder::new(legacy, NonZeroUsize::new(1536).unwrap()).unwrap();
        assert_eq!(
            serde_json::to_value(embedder.payload("task")).unwrap(),
            serde_json::json!({"model": "text-embedding-ada-002", "input": "task"})
        );
        assert_eq!(embedder.model(), "text-embedding-ada-002");
    }

    #[test]
    fn completions_and_embeddings_decode() {
        let completion: Completion =
            serde_json::from_str(r#"{"choices": [{"message": {"role": "assistant", "content": "{\"selected\": [0]}"}}]}"#)
                .unwrap();
        assert_eq!(completion.into_text().unwrap(), r#"{"selected": [0]}"#);

        let empty: Completion = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        assert!(matches!(empty.into_text(), Err(ModelError::Decode { .. })));

        let embeddings: Embeddings = serde_json::from_str(
            r#"{"object": "list", "data": [{"object": "embedding", "index": 0, "embedding": [0.1, -0.2]}]}"#,
        )
        .unwrap();
        assert_eq!(embeddings.data[0].embedding, [0.1, -0.2]);
    }
}
