//! RAG pipeline orchestrator.
//!
//! The [`RagPipeline`] ties the stages together for a single document:
//! ingestion (chunk → embed → persist) and question answering
//! (retrieve → join context → generate).
//!
//! # Example
//!
//! ```rust,ignore
//! use minirag::{HashingEmbeddingProvider, RagConfig, RagPipeline};
//!
//! let pipeline = RagPipeline::builder()
//!     .config(RagConfig::default())
//!     .embedding_provider(Arc::new(HashingEmbeddingProvider::default()))
//!     .generator(Arc::new(my_generator))
//!     .build()?;
//!
//! pipeline.ingest_file("report.pdf").await?;
//! let answer = pipeline.ask("What is discussed?").await?;
//! println!("{}", answer.text);
//! ```

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::cache::{CacheKey, IndexCache};
use crate::chunking::{Chunker, RecursiveChunker};
use crate::config::RagConfig;
use crate::document::{Document, DocumentFormat, SearchResult};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::generation::{AnswerGenerator, GenerationConfig, TextGenerator};
use crate::index::{IndexSource, VectorIndex};
use crate::loader;
use crate::retriever::{Retriever, join_context};

/// A generated answer together with the chunks it was conditioned on.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Answer {
    /// The question that was asked.
    pub query: String,
    /// The cleaned model output.
    pub text: String,
    /// Retrieved chunks in rank order, nearest first.
    pub sources: Vec<SearchResult>,
}

/// The RAG pipeline orchestrator.
///
/// Holds at most one document's index at a time: ingesting a different
/// document replaces both the cached and the persisted index. Construct one
/// via [`RagPipeline::builder()`].
pub struct RagPipeline {
    config: RagConfig,
    embedding_provider: Arc<dyn EmbeddingProvider>,
    chunker: Arc<dyn Chunker>,
    custom_chunker: bool,
    retriever: Retriever,
    answer_generator: AnswerGenerator,
    cache: IndexCache,
}

impl RagPipeline {
    /// Create a new [`RagPipelineBuilder`].
    pub fn builder() -> RagPipelineBuilder {
        RagPipelineBuilder::default()
    }

    /// Return a reference to the pipeline configuration.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Return a reference to the embedding provider.
    pub fn embedding_provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedding_provider
    }

    /// Directory the index is persisted to.
    pub fn index_dir(&self) -> &Path {
        &self.config.index_dir
    }

    /// Index a document: chunk → embed → persist → cache.
    ///
    /// If the cached index, or failing that the persisted one, was built from
    /// the same bytes, format, chunking, and embedding provider it is returned
    /// without re-embedding. Indexes built with a custom chunker are only
    /// reused from the in-memory cache.
    ///
    /// # Errors
    ///
    /// - [`RagError::EmbeddingFailure`] if any chunk cannot be embedded; the
    ///   previous index is left in place
    /// - [`RagError::StorageFailure`] if the index cannot be written
    pub async fn ingest(&self, document: &Document) -> Result<Arc<VectorIndex>> {
        let key = CacheKey::for_document(document);
        if let Some(index) = self.cache.get(&key).await {
            info!(document.id = %document.id, chunk_count = index.len(), "reused cached index");
            return Ok(index);
        }

        let source = self.index_source(&key);
        if let Some(index) = source.as_ref().and_then(|source| self.persisted_index_for(source)) {
            let index = Arc::new(index);
            self.cache.insert(key, Arc::clone(&index)).await;
            info!(document.id = %document.id, chunk_count = index.len(), "reused persisted index");
            return Ok(index);
        }

        let chunks = self.chunker.chunk(document);
        let chunk_count = chunks.len();

        let mut index =
            VectorIndex::build(chunks, self.embedding_provider.as_ref(), self.config.metric)
                .await
                .map_err(|e| {
                    error!(document.id = %document.id, error = %e, "index build failed");
                    e
                })?;
        if let Some(source) = source {
            index = index.with_source(source);
        }

        let path = index.persist(&self.config.index_dir).map_err(|e| {
            error!(document.id = %document.id, error = %e, "index persist failed");
            e
        })?;

        let index = Arc::new(index);
        self.cache.insert(key, Arc::clone(&index)).await;

        info!(document.id = %document.id, chunk_count, path = %path.display(), "ingested document");
        Ok(index)
    }

    /// Load `bytes` as `format` and ingest the result.
    ///
    /// # Errors
    ///
    /// See [`loader::load_document`] and [`ingest`](Self::ingest).
    pub async fn ingest_bytes(
        &self,
        bytes: &[u8],
        format: DocumentFormat,
        source_name: Option<&str>,
    ) -> Result<Arc<VectorIndex>> {
        let document = loader::load_document(bytes, format, source_name)?;
        self.ingest(&document).await
    }

    /// Read the file at `path` and ingest it.
    ///
    /// # Errors
    ///
    /// See [`loader::load_file`] and [`ingest`](Self::ingest).
    pub async fn ingest_file(&self, path: impl AsRef<Path>) -> Result<Arc<VectorIndex>> {
        let document = loader::load_file(path)?;
        self.ingest(&document).await
    }

    /// The index questions are answered against.
    ///
    /// Prefers the in-memory index from the last ingestion and otherwise reads
    /// the persisted one from `index_dir`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::IndexNotFound`] if nothing has been ingested yet,
    /// or the errors of [`VectorIndex::load`].
    pub async fn current_index(&self) -> Result<Arc<VectorIndex>> {
        if let Some(index) = self.cache.current().await {
            return Ok(index);
        }
        let index = VectorIndex::load(&self.config.index_dir).map_err(|e| {
            error!(index_dir = %self.config.index_dir.display(), error = %e, "index load failed");
            e
        })?;
        Ok(Arc::new(index))
    }

    /// Return the `top_k` chunks nearest to `query`, nearest first.
    ///
    /// # Errors
    ///
    /// See [`current_index`](Self::current_index) and [`Retriever::retrieve`].
    pub async fn retrieve(&self, query: &str) -> Result<Vec<SearchResult>> {
        let index = self.current_index().await?;
        self.retriever.retrieve(query, &index, self.config.top_k).await
    }

    /// Answer `query` from the indexed document.
    ///
    /// An empty index yields an empty context; the generator is still called.
    ///
    /// # Errors
    ///
    /// Retrieval errors as in [`retrieve`](Self::retrieve), and
    /// [`RagError::GenerationFailure`] if no answer is produced.
    pub async fn ask(&self, query: &str) -> Result<Answer> {
        let sources = self.retrieve(query).await?;
        let context = join_context(&sources);
        let text = self.answer_generator.generate(query, &context).await?;

        info!(source_count = sources.len(), answer_len = text.len(), "answered question");
        Ok(Answer { query: query.to_string(), text, sources })
    }

    fn index_source(&self, key: &CacheKey) -> Option<IndexSource> {
        if self.custom_chunker {
            return None;
        }
        Some(IndexSource {
            content_hash: key.content_hash.clone(),
            format: key.format,
            chunk_size: self.config.chunk_size,
            chunk_overlap: self.config.chunk_overlap,
        })
    }

    /// The persisted index, if it was built from `source` with this
    /// pipeline's embedding provider and metric.
    fn persisted_index_for(&self, source: &IndexSource) -> Option<VectorIndex> {
        let index = match VectorIndex::load(&self.config.index_dir) {
            Ok(index) => index,
            Err(e) => {
                debug!(error = %e, "no reusable persisted index");
                return None;
            }
        };
        let provider = self.embedding_provider.as_ref();
        let matches = index.source() == Some(source)
            && index.embedding_model() == provider.name()
            && index.metric() == self.config.metric
            && (index.is_empty() || index.dimensions() == provider.dimensions());
        if !matches {
            debug!(
                index_dir = %self.config.index_dir.display(),
                "persisted index was built from another source"
            );
            return None;
        }
        Some(index)
    }

    /// Drop the in-memory index; the persisted copy is kept.
    pub async fn clear_cache(&self) {
        self.cache.clear().await;
    }
}

/// Builder for constructing a [`RagPipeline`].
///
/// `config`, `embedding_provider`, and `generator` are required. The chunker
/// defaults to a [`RecursiveChunker`] sized from the config, and the stop
/// sequences to those of [`GenerationConfig::default`].
///
/// # Example
///
/// ```rust,ignore
/// let pipeline = RagPipeline::builder()
///     .config(RagConfig::default())
///     .embedding_provider(Arc::new(embedder))
///     .generator(Arc::new(generator))
///     .chunker(Arc::new(chunker))  // optional
///     .build()?;
/// ```
#[derive(Default)]
pub struct RagPipelineBuilder {
    config: Option<RagConfig>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    generator: Option<Arc<dyn TextGenerator>>,
    chunker: Option<Arc<dyn Chunker>>,
    stop_sequences: Option<Vec<String>>,
}

impl RagPipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the embedding provider used for both chunks and questions.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Set the text-generation backend.
    pub fn generator(mut self, generator: Arc<dyn TextGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Override the document chunker.
    pub fn chunker(mut self, chunker: Arc<dyn Chunker>) -> Self {
        self.chunker = Some(chunker);
        self
    }

    /// Override the sequences generated answers are cut at.
    pub fn stop_sequences(mut self, stops: Vec<String>) -> Self {
        self.stop_sequences = Some(stops);
        self
    }

    /// Build the [`RagPipeline`], validating the config and required parts.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidConfiguration`] if a required part is
    /// missing or the config fails [`RagConfig::validate`].
    pub fn build(self) -> Result<RagPipeline> {
        let config = self
            .config
            .ok_or_else(|| RagError::InvalidConfiguration("config is required".to_string()))?;
        config.validate()?;
        let embedding_provider = self.embedding_provider.ok_or_else(|| {
            RagError::InvalidConfiguration("embedding_provider is required".to_string())
        })?;
        let generator = self
            .generator
            .ok_or_else(|| RagError::InvalidConfiguration("generator is required".to_string()))?;
        let custom_chunker = self.chunker.is_some();
        let chunker: Arc<dyn Chunker> = match self.chunker {
            Some(chunker) => chunker,
            None => Arc::new(RecursiveChunker::new(config.chunk_size, config.chunk_overlap)?),
        };

        let mut generation = GenerationConfig {
            max_new_tokens: config.max_new_tokens,
            ..GenerationConfig::default()
        };
        if let Some(stops) = self.stop_sequences {
            generation.stop_sequences = stops;
        }

        Ok(RagPipeline {
            retriever: Retriever::new(Arc::clone(&embedding_provider)),
            answer_generator: AnswerGenerator::new(generator, generation),
            cache: IndexCache::new(),
            config,
            embedding_provider,
            chunker,
            custom_chunker,
        })
    }
}
