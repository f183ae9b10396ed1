// Provider module
// Embedding and chat-completion backends behind two narrow traits

pub mod http;
pub mod ollama;
pub mod openai;

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::{Config, EmbeddingBackend};
use crate::{QaError, Result};

pub use http::HttpTransport;
pub use ollama::OllamaEmbedder;
pub use openai::OpenAiClient;

/// Turns text into fixed-length vectors, one per input and in input order.
pub trait Embedder {
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Identifier of the embedding model, for diagnostics
    fn model(&self) -> &str;
}

/// Produces candidate replies for a conversation.
pub trait Completer {
    /// Returns the content of every choice, in the order the provider gave them
    fn complete(&self, messages: &[ChatMessage]) -> Result<Vec<String>>;

    fn model(&self) -> &str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    #[inline]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Builds the embedding and completion clients described by `config`.
///
/// Fails when the API key variable is unset, since completions always go to
/// the OpenAI-compatible endpoint.
#[inline]
pub fn from_config(config: &Config) -> Result<(Box<dyn Embedder>, Box<dyn Completer>)> {
    let api_key = config.provider.api_key()?;
    let transport = HttpTransport::new(
        Duration::from_secs(config.provider.timeout_seconds),
        config.provider.retry_attempts,
    );

    let completer = OpenAiClient::new(
        config.provider.api_url()?,
        config.provider.embedding_model.clone(),
        config.provider.completion_model.clone(),
        transport.clone().with_bearer_token(api_key),
    )
    .with_batch_size(config.provider.batch_size);

    let embedder: Box<dyn Embedder> = match config.provider.embedding_backend {
        EmbeddingBackend::OpenAi => Box::new(completer.clone()),
        EmbeddingBackend::Ollama => Box::new(OllamaEmbedder::new(
            config.ollama_url()?,
            config.provider.embedding_model.clone(),
            config.provider.batch_size,
            transport,
        )),
    };

    Ok((embedder, Box::new(completer)))
}

pub(crate) fn embedding_error(error: &anyhow::Error) -> QaError {
    QaError::Embedding(format!("{error:#}"))
}

pub(crate) fn completion_error(error: &anyhow::Error) -> QaError {
    QaError::Completion(format!("{error:#}"))
}
