//! [`HttpEmbedder`] – OpenAI-compatible embedding provider.
//!
//! Talks to any server exposing `POST /v1/embeddings`
//! (`{"model", "input"}` in, `{"data": [{"embedding": [...]}]}` out), such as
//! OpenAI itself or a local Ollama instance.
//!
//! # Example
//!
//! ```rust,no_run
//! use mnemos_runtime::embedder::HttpEmbedder;
//!
//! let embedder = HttpEmbedder::new("http://localhost:11434", "nomic-embed-text", 768);
//! // Requires a running server – skipped in unit tests.
//! ```

use async_trait::async_trait;
use mnemos_memory::Embedder;
use mnemos_types::{Deadline, MnemosError, Result};
use serde::{Deserialize, Serialize};

use crate::http::{post_json, trim_base};

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

/// Async client for an OpenAI-compatible embeddings endpoint.
pub struct HttpEmbedder {
    base_url: String,
    model: String,
    api_key: Option<String>,
    dimensions: usize,
    client: reqwest::Client,
}

impl std::fmt::Debug for HttpEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpEmbedder")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("dimensions", &self.dimensions)
            .finish()
    }
}

impl HttpEmbedder {
    /// `dimensions` is the width every returned vector must have.
    pub fn new(base_url: impl Into<String>, model: impl Into<String>, dimensions: usize) -> Self {
        Self {
            base_url: trim_base(base_url),
            model: model.into(),
            api_key: None,
            dimensions,
            client: reqwest::Client::new(),
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn url(&self) -> String {
        format!("{}/v1/embeddings", self.base_url)
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, text: &str, deadline: Deadline) -> Result<Vec<f32>> {
        let body = EmbeddingRequest {
            model: &self.model,
            input: text,
        };
        let response: EmbeddingResponse = post_json(
            &self.client,
            &self.url(),
            self.api_key.as_deref(),
            &body,
            "embedding",
            deadline,
        )
        .await?;
        first_embedding(response)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        &self.model
    }
}

fn first_embedding(response: EmbeddingResponse) -> Result<Vec<f32>> {
    response
        .data
        .into_iter()
        .next()
        .map(|d| d.embedding)
        .ok_or_else(|| MnemosError::provider("embedding", "empty data array"))
}
