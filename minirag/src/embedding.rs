//! Embedding provider trait for generating vector embeddings from text.

use async_trait::async_trait;
use tracing::debug;

use crate::error::{RagError, Result};

/// A provider that generates vector embeddings from text input.
///
/// Implementations wrap specific embedding backends (Ollama, OpenAI-compatible
/// servers, the offline [`HashingEmbeddingProvider`]) behind a unified async
/// interface. The default [`embed_batch`](EmbeddingProvider::embed_batch)
/// implementation calls [`embed`](EmbeddingProvider::embed) sequentially;
/// backends that support native batching should override it.
///
/// An index and the queries run against it must use the same provider and
/// model: vectors from different models live in unrelated spaces.
///
/// # Example
///
/// ```rust,ignore
/// use minirag::EmbeddingProvider;
///
/// let provider = MyEmbeddingProvider::new();
/// let embedding = provider.embed("hello world").await?;
/// assert_eq!(embedding.len(), provider.dimensions());
/// ```
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding vector for a single text input.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embedding vectors for a batch of text inputs.
    ///
    /// The default implementation calls [`embed`](EmbeddingProvider::embed)
    /// sequentially for each input. Override this method if the backend
    /// supports native batch embedding for better throughput.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// Return the dimensionality of embeddings produced by this provider.
    fn dimensions(&self) -> usize;

    /// Identify the provider and model, e.g. `ollama/all-minilm`.
    ///
    /// The identifier is recorded in every index built with this provider.
    fn name(&self) -> &str;
}

/// An offline, deterministic embedder based on feature hashing.
///
/// Text is lower-cased and split into alphanumeric tokens; each token is
/// hashed (FNV-1a) into one of `dimensions` buckets with a hash-derived sign,
/// and the resulting vector is L2-normalised. Texts sharing vocabulary land
/// close together under cosine distance, which is enough for lexical
/// retrieval without a model server.
#[derive(Debug, Clone)]
pub struct HashingEmbeddingProvider {
    dimensions: usize,
    name: String,
}

impl HashingEmbeddingProvider {
    /// Default number of buckets.
    pub const DEFAULT_DIMENSIONS: usize = 384;

    /// Create a provider producing vectors with `dimensions` components.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidConfiguration`] if `dimensions` is zero.
    pub fn new(dimensions: usize) -> Result<Self> {
        if dimensions == 0 {
            return Err(RagError::InvalidConfiguration(
                "embedding dimensions must be greater than zero".to_string(),
            ));
        }
        Ok(Self { dimensions, name: format!("hashing/{dimensions}") })
    }

    fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        for token in tokens(text) {
            let hash = fnv1a(token.as_bytes());
            let bucket = (hash % self.dimensions as u64) as usize;
            let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|x| *x /= norm);
        }
        vector
    }
}

impl Default for HashingEmbeddingProvider {
    fn default() -> Self {
        let dimensions = Self::DEFAULT_DIMENSIONS;
        Self { dimensions, name: format!("hashing/{dimensions}") }
    }
}

#[async_trait]
impl EmbeddingProvider for HashingEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_sync(text))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        debug!(provider = %self.name, batch_size = texts.len(), "embedding batch");
        Ok(texts.iter().map(|text| self.embed_sync(text)).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Lower-cased alphanumeric tokens of `text`.
fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_lowercase)
}

fn fnv1a(bytes: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    bytes.iter().fold(OFFSET, |hash, b| (hash ^ u64::from(*b)).wrapping_mul(PRIME))
}
