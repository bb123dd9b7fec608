//! OpenAI-compatible embedding and completion backends.
//!
//! Works against the OpenAI API and any server exposing the same
//! `/v1/embeddings` and `/v1/completions` endpoints (vLLM, llama.cpp server,
//! text-generation-inference). This module is only available when the
//! `openai` feature is enabled.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::generation::TextGenerator;

/// The default OpenAI API base URL.
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// The default model for OpenAI embeddings.
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// The default dimensionality for `text-embedding-3-small`.
const DEFAULT_DIMENSIONS: usize = 1536;

/// The default completion model.
const DEFAULT_COMPLETION_MODEL: &str = "gpt-3.5-turbo-instruct";

/// Connection settings shared by both backends.
#[derive(Clone)]
struct Endpoint {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl Endpoint {
    fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let api_key = api_key.filter(|k| !k.is_empty());
        Self { client: reqwest::Client::new(), base_url, api_key }
    }

    /// POST `body` to `{base_url}/{path}` and decode the JSON reply.
    async fn post<B: Serialize, R: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> std::result::Result<R, String> {
        let url = format!("{}/{path}", self.base_url);
        let mut request = self.client.post(&url).json(body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| format!("request failed: {e}"))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(format!("API returned {status}: {detail}"));
        }

        response.json().await.map_err(|e| format!("failed to parse response: {e}"))
    }
}

// ── API request/response types ─────────────────────────────────────

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    #[serde(default)]
    index: Option<usize>,
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    max_tokens: usize,
    temperature: f32,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    text: String,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

/// An [`EmbeddingProvider`] backed by an OpenAI-compatible embeddings API.
///
/// # Configuration
///
/// - `model`: defaults to `text-embedding-3-small`.
/// - `dimensions`: optional Matryoshka dimension override.
/// - `api_key`: from the constructor or the `OPENAI_API_KEY` environment variable;
///   may be omitted for local servers.
///
/// # Example
///
/// ```rust,ignore
/// use minirag::openai::OpenAIEmbeddingProvider;
///
/// let provider = OpenAIEmbeddingProvider::new(OPENAI_BASE_URL, Some("sk-...".into()));
/// let embedding = provider.embed("hello world").await?;
/// ```
pub struct OpenAIEmbeddingProvider {
    endpoint: Endpoint,
    model: String,
    dimensions: usize,
    /// If set, passed to the API for Matryoshka dimension truncation.
    request_dimensions: Option<usize>,
    name: String,
}

impl OpenAIEmbeddingProvider {
    /// Create a provider for the server at `base_url` (e.g. `https://api.openai.com/v1`).
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            endpoint: Endpoint::new(base_url, api_key),
            model: DEFAULT_EMBEDDING_MODEL.into(),
            dimensions: DEFAULT_DIMENSIONS,
            request_dimensions: None,
            name: format!("openai/{DEFAULT_EMBEDDING_MODEL}"),
        }
    }

    /// Create a provider for the OpenAI API using the `OPENAI_API_KEY` environment variable.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::EmbeddingFailure`] if the variable is not set.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| RagError::EmbeddingFailure {
            provider: "openai".into(),
            message: "OPENAI_API_KEY environment variable not set".into(),
        })?;
        Ok(Self::new(OPENAI_BASE_URL, Some(api_key)))
    }

    /// Set the model name (e.g. `text-embedding-3-large`).
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self.name = format!("openai/{}", self.model);
        self
    }

    /// Set the output dimensions (Matryoshka support).
    ///
    /// When set, the API returns embeddings truncated to this size.
    /// This also updates the value returned by [`dimensions()`](EmbeddingProvider::dimensions).
    pub fn with_dimensions(mut self, dims: usize) -> Self {
        self.dimensions = dims;
        self.request_dimensions = Some(dims);
        self
    }

    fn failure(&self, message: String) -> RagError {
        error!(provider = %self.name, %message, "embedding request failed");
        RagError::EmbeddingFailure { provider: self.name.clone(), message }
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAIEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        debug!(provider = %self.name, text_len = text.len(), "embedding single text");

        let results = self.embed_batch(&[text]).await?;
        results.into_iter().next().ok_or_else(|| self.failure("API returned empty response".into()))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!(provider = %self.name, batch_size = texts.len(), "embedding batch");

        let request = EmbeddingRequest {
            model: &self.model,
            input: texts.to_vec(),
            dimensions: self.request_dimensions,
        };
        let response: EmbeddingResponse =
            self.endpoint.post("embeddings", &request).await.map_err(|m| self.failure(m))?;

        let mut data = response.data;
        // The API may return items out of order; `index` restores input order.
        data.sort_by_key(|d| d.index.unwrap_or(usize::MAX));
        Ok(data.into_iter().map(|d| d.embedding).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// A [`TextGenerator`] backed by an OpenAI-compatible `/completions` endpoint.
///
/// Sampling is greedy (`temperature = 0`) so the same prompt yields the same answer
/// on backends that honour it.
pub struct OpenAICompletionGenerator {
    endpoint: Endpoint,
    model: String,
    name: String,
}

impl OpenAICompletionGenerator {
    /// Create a generator for the server at `base_url` using the default completion model.
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            endpoint: Endpoint::new(base_url, api_key),
            model: DEFAULT_COMPLETION_MODEL.into(),
            name: format!("openai/{DEFAULT_COMPLETION_MODEL}"),
        }
    }

    /// Set the completion model name.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self.name = format!("openai/{}", self.model);
        self
    }
}

#[async_trait]
impl TextGenerator for OpenAICompletionGenerator {
    async fn generate_text(&self, prompt: &str, max_new_tokens: usize) -> Result<String> {
        debug!(
            provider = %self.name,
            prompt_len = prompt.len(),
            max_new_tokens,
            "completion request"
        );

        let request = CompletionRequest {
            model: &self.model,
            prompt,
            max_tokens: max_new_tokens,
            temperature: 0.0,
        };
        let failure = |message: String| {
            error!(provider = %self.name, %message, "completion request failed");
            RagError::GenerationFailure { provider: self.name.clone(), message }
        };

        let response: CompletionResponse =
            self.endpoint.post("completions", &request).await.map_err(failure)?;
        response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.text)
            .ok_or_else(|| failure("API returned no choices".to_string()))
    }

    fn name(&self) -> &str {
        &self.name
    }
}
