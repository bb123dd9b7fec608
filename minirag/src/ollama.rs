//! Ollama embedding and generation backends.
//!
//! Talks to a local Ollama server over its HTTP API: `/api/embed` for
//! embeddings and `/api/generate` (non-streaming) for answers. This module is
//! only available when the `ollama` feature is enabled.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::generation::TextGenerator;

/// Default Ollama server address.
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// Default embedding model (sentence-transformers all-MiniLM-L6-v2).
pub const DEFAULT_EMBEDDING_MODEL: &str = "all-minilm";

/// Output size of [`DEFAULT_EMBEDDING_MODEL`].
pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = 384;

/// Default generation model.
pub const DEFAULT_GENERATION_MODEL: &str = "llama3.2";

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    num_predict: usize,
    temperature: f32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Deserialize)]
struct OllamaError {
    error: String,
}

/// POST `body` to `{base_url}{path}` and decode the JSON reply.
async fn post_json<B: Serialize, R: serde::de::DeserializeOwned>(
    client: &reqwest::Client,
    base_url: &str,
    path: &str,
    body: &B,
) -> std::result::Result<R, String> {
    let url = format!("{base_url}{path}");
    let response =
        client.post(&url).json(body).send().await.map_err(|e| format!("request failed: {e}"))?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let detail = serde_json::from_str::<OllamaError>(&body).map(|e| e.error).unwrap_or(body);
        return Err(format!("server returned {status}: {detail}"));
    }

    response.json().await.map_err(|e| format!("failed to parse response: {e}"))
}

fn normalize_base_url(base_url: impl Into<String>) -> String {
    base_url.into().trim_end_matches('/').to_string()
}

/// An [`EmbeddingProvider`] backed by an Ollama embedding model.
///
/// # Example
///
/// ```rust,ignore
/// use minirag::ollama::OllamaEmbeddingProvider;
///
/// let provider = OllamaEmbeddingProvider::new(DEFAULT_OLLAMA_URL)
///     .with_model("nomic-embed-text", 768);
/// ```
pub struct OllamaEmbeddingProvider {
    client: reqwest::Client,
    base_url: String,
    model: String,
    dimensions: usize,
    name: String,
}

impl OllamaEmbeddingProvider {
    /// Create a provider for the server at `base_url` using `all-minilm`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: normalize_base_url(base_url),
            model: DEFAULT_EMBEDDING_MODEL.to_string(),
            dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
            name: format!("ollama/{DEFAULT_EMBEDDING_MODEL}"),
        }
    }

    /// Use a different embedding model producing `dimensions`-sized vectors.
    pub fn with_model(mut self, model: impl Into<String>, dimensions: usize) -> Self {
        self.model = model.into();
        self.dimensions = dimensions;
        self.name = format!("ollama/{}", self.model);
        self
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_batch(&[text]).await?;
        vectors.pop().ok_or_else(|| RagError::EmbeddingFailure {
            provider: self.name.clone(),
            message: "server returned no embedding".to_string(),
        })
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!(provider = %self.name, batch_size = texts.len(), "embedding batch");

        let request = EmbedRequest { model: &self.model, input: texts };
        let response: EmbedResponse =
            post_json(&self.client, &self.base_url, "/api/embed", &request).await.map_err(
                |message| {
                    error!(provider = %self.name, %message, "embedding request failed");
                    RagError::EmbeddingFailure { provider: self.name.clone(), message }
                },
            )?;

        Ok(response.embeddings)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// A [`TextGenerator`] backed by an Ollama model via `/api/generate`.
///
/// Ollama returns only the continuation, never the prompt.
pub struct OllamaGenerator {
    client: reqwest::Client,
    base_url: String,
    model: String,
    temperature: f32,
    name: String,
}

impl OllamaGenerator {
    /// Create a generator for the server at `base_url` using `llama3.2`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: normalize_base_url(base_url),
            model: DEFAULT_GENERATION_MODEL.to_string(),
            temperature: 0.0,
            name: format!("ollama/{DEFAULT_GENERATION_MODEL}"),
        }
    }

    /// Use a different generation model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self.name = format!("ollama/{}", self.model);
        self
    }

    /// Set the sampling temperature (default 0, greedy).
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

#[async_trait]
impl TextGenerator for OllamaGenerator {
    async fn generate_text(&self, prompt: &str, max_new_tokens: usize) -> Result<String> {
        debug!(
            provider = %self.name,
            prompt_len = prompt.len(),
            max_new_tokens,
            "generate request"
        );

        let request = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: GenerateOptions { num_predict: max_new_tokens, temperature: self.temperature },
        };
        let response: GenerateResponse =
            post_json(&self.client, &self.base_url, "/api/generate", &request).await.map_err(
                |message| {
                    error!(provider = %self.name, %message, "generate request failed");
                    RagError::GenerationFailure { provider: self.name.clone(), message }
                },
            )?;

        Ok(response.response)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
