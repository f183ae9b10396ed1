#[cfg(test)]
mod tests;

use anyhow::{Context, anyhow};
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use super::{ChatMessage, Completer, Embedder, HttpTransport, completion_error, embedding_error};
use crate::Result;

/// Largest number of inputs the OpenAI embeddings endpoint accepts per request
pub const MAX_EMBEDDING_BATCH: u32 = 2048;

/// Client for an OpenAI-compatible REST API (`/embeddings`, `/chat/completions`)
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    base_url: Url,
    embedding_model: String,
    completion_model: String,
    batch_size: u32,
    transport: HttpTransport,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiClient {
    /// `base_url` must end with a slash, e.g. `https://api.openai.com/v1/`
    #[inline]
    pub fn new(
        base_url: Url,
        embedding_model: String,
        completion_model: String,
        transport: HttpTransport,
    ) -> Self {
        Self {
            base_url,
            embedding_model,
            completion_model,
            batch_size: MAX_EMBEDDING_BATCH,
            transport,
        }
    }

    /// Inputs per embeddings request, clamped to `1..=2048`
    #[inline]
    pub fn with_batch_size(mut self, batch_size: u32) -> Self {
        self.batch_size = batch_size.clamp(1, MAX_EMBEDDING_BATCH);
        self
    }

    fn endpoint(&self, path: &str) -> anyhow::Result<Url> {
        self.base_url
            .join(path)
            .with_context(|| format!("Failed to build {path} URL"))
    }

    fn request_embeddings(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        let url = self.endpoint("embeddings")?;
        let request = EmbeddingRequest {
            model: &self.embedding_model,
            input: texts,
        };

        let response: EmbeddingResponse = self
            .transport
            .post_json(&url, &request)
            .context("Failed to generate embeddings")?;

        if response.data.len() != texts.len() {
            return Err(anyhow!(
                "Mismatch between request and response counts: {} vs {}",
                texts.len(),
                response.data.len()
            ));
        }

        let mut slots: Vec<Option<Vec<f32>>> = vec![None; texts.len()];
        for item in response.data {
            let slot = slots
                .get_mut(item.index)
                .ok_or_else(|| anyhow!("Embedding index {} is out of range", item.index))?;
            if slot.replace(item.embedding).is_some() {
                return Err(anyhow!("Duplicate embedding index {}", item.index));
            }
        }

        slots
            .into_iter()
            .enumerate()
            .map(|(i, slot)| slot.ok_or_else(|| anyhow!("Missing embedding for input {i}")))
            .collect()
    }

    fn request_completion(&self, messages: &[ChatMessage]) -> anyhow::Result<Vec<String>> {
        let url = self.endpoint("chat/completions")?;
        let request = ChatRequest {
            model: &self.completion_model,
            messages,
        };

        let response: ChatResponse = self
            .transport
            .post_json(&url, &request)
            .context("Failed to generate completion")?;

        Ok(response
            .choices
            .into_iter()
            .map(|choice| choice.message.content.unwrap_or_default())
            .collect())
    }
}

impl Embedder for OpenAiClient {
    #[inline]
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!(
            "Requesting {} embeddings from {} with model {} in batches of {}",
            texts.len(),
            self.base_url,
            self.embedding_model,
            self.batch_size
        );
        let mut vectors = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(self.batch_size as usize) {
            let batch = self
                .request_embeddings(chunk)
                .with_context(|| format!("Failed to process batch of {} texts", chunk.len()))
                .map_err(|e| embedding_error(&e))?;
            vectors.extend(batch);
        }
        debug!(
            "Received {} embeddings with {} dimensions",
            vectors.len(),
            vectors.first().map_or(0, Vec::len)
        );
        Ok(vectors)
    }

    #[inline]
    fn model(&self) -> &str {
        &self.embedding_model
    }
}

impl Completer for OpenAiClient {
    #[inline]
    fn complete(&self, messages: &[ChatMessage]) -> Result<Vec<String>> {
        debug!(
            "Requesting completion for {} messages with model {}",
            messages.len(),
            self.completion_model
        );
        let choices = self
            .request_completion(messages)
            .map_err(|e| completion_error(&e))?;
        debug!("Received {} choices", choices.len());
        Ok(choices)
    }

    #[inline]
    fn model(&self) -> &str {
        &self.completion_model
    }
}
