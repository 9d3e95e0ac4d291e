//! The embedding seam: the [`EmbeddingClient`] trait and the Ollama-backed
//! implementation.
//!
//! Embeddings from different models are not comparable, so a store must only
//! ever be fed by one model; the pipeline and the search engine must share a
//! client configured the same way.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
pub const DEFAULT_MODEL: &str = "qllama/bge-m3";

pub const OLLAMA_URL_ENV_VAR: &str = "CARPET_OLLAMA_URL";
pub const MODEL_ENV_VAR: &str = "CARPET_MODEL";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_MAX_RETRIES: u32 = 2;
const RETRY_BASE_DELAY: Duration = Duration::from_millis(250);

/// Maps text to a fixed-length embedding vector.
pub trait EmbeddingClient {
    fn embed_text(&self, text: &str) -> Result<Vec<f32>>;
}

#[derive(Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    embedding: Vec<f32>,
}

/// Blocking client for the Ollama `/api/embeddings` endpoint.
///
/// Every call is a synchronous request/response with a bounded timeout and a
/// small number of retries with exponential backoff; exhausting the retries
/// surfaces as an embedding-service error.
pub struct OllamaEmbedder {
    agent: ureq::Agent,
    base_url: String,
    model: String,
    max_retries: u32,
}

impl Default for OllamaEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

impl OllamaEmbedder {
    /// Create a client resolved from the environment: `CARPET_OLLAMA_URL`
    /// and `CARPET_MODEL`, falling back to `http://localhost:11434` and
    /// `qllama/bge-m3`.
    pub fn new() -> Self {
        let base_url = std::env::var(OLLAMA_URL_ENV_VAR)
            .unwrap_or_else(|_| DEFAULT_OLLAMA_URL.to_string());
        let model =
            std::env::var(MODEL_ENV_VAR).unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        Self::with_config(base_url, model, DEFAULT_TIMEOUT, DEFAULT_MAX_RETRIES)
    }

    /// Create a client with explicit endpoint, model, timeout, and retry
    /// budget, bypassing environment resolution.
    pub fn with_config(
        base_url: String,
        model: String,
        timeout: Duration,
        max_retries: u32,
    ) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Self {
            agent,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            max_retries,
        }
    }

    /// The model this client sends requests for.
    pub fn model(&self) -> &str {
        &self.model
    }

    fn request(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/api/embeddings", self.base_url);
        let body = EmbeddingsRequest {
            model: &self.model,
            prompt: text,
        };

        let response: EmbeddingsResponse = self
            .agent
            .post(&url)
            .send_json(&body)
            .map_err(|e| Error::Embedding(format!("request to {url} failed: {e}")))?
            .into_json()
            .map_err(|e| Error::Embedding(format!("malformed response from {url}: {e}")))?;

        if response.embedding.is_empty() {
            return Err(Error::Embedding(format!(
                "model '{}' returned an empty embedding",
                self.model
            )));
        }
        Ok(response.embedding)
    }
}

impl EmbeddingClient for OllamaEmbedder {
    fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        let mut delay = RETRY_BASE_DELAY;
        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            match self.request(text) {
                Ok(vector) => return Ok(vector),
                Err(err) => {
                    if attempt < self.max_retries {
                        tracing::warn!(
                            attempt = attempt + 1,
                            max = self.max_retries + 1,
                            "embedding request failed, retrying: {err}"
                        );
                        std::thread::sleep(delay);
                        delay *= 2;
                    }
                    last_err = Some(err);
                }
            }
        }

        Err(last_err
            .unwrap_or_else(|| Error::Embedding("embedding request failed".into())))
    }
}

impl std::fmt::Debug for OllamaEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OllamaEmbedder")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_parsing() {
        let json = r#"{"embedding": [0.1, -0.2, 0.3]}"#;
        let parsed: EmbeddingsResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.embedding, vec![0.1, -0.2, 0.3]);
    }

    #[test]
    fn request_serialization() {
        let body = EmbeddingsRequest {
            model: "qllama/bge-m3",
            prompt: "hello",
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["model"], "qllama/bge-m3");
        assert_eq!(json["prompt"], "hello");
    }

    #[test]
    fn base_url_trailing_slash_trimmed() {
        let client = OllamaEmbedder::with_config(
            "http://localhost:11434/".to_string(),
            "m".to_string(),
            Duration::from_secs(1),
            0,
        );
        assert_eq!(client.base_url, "http://localhost:11434");
    }

    #[test]
    fn unreachable_server_is_embedding_error() {
        // Port 1 is reserved and refused immediately; zero retries keeps the
        // test fast.
        let client = OllamaEmbedder::with_config(
            "http://127.0.0.1:1".to_string(),
            "m".to_string(),
            Duration::from_millis(200),
            0,
        );
        match client.embed_text("hello") {
            Err(Error::Embedding(_)) => {}
            other => panic!("expected embedding error, got {other:?}"),
        }
    }
}
