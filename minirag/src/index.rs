//! Embedding index with exact nearest-neighbour search and atomic persistence.
//!
//! A [`VectorIndex`] is built once per document from its chunks, searched by
//! brute-force distance over every stored vector, and persisted as a single
//! JSON file (`index.json`) inside an index directory. The index is immutable
//! after [`build`](VectorIndex::build) or [`load`](VectorIndex::load), so it
//! can be shared across concurrent readers behind an `Arc` without locking.

use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::document::{Chunk, DocumentFormat, IndexedChunk, SearchResult};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};

/// Version of the persisted layout written by this crate.
pub const INDEX_FORMAT_VERSION: u32 = 1;

/// File name of the persisted index inside its directory.
pub const INDEX_FILE_NAME: &str = "index.json";

/// How the distance between two vectors is measured.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    /// `1 - cosine_similarity`, in `[0, 2]`.
    #[default]
    Cosine,
    /// Straight-line (L2) distance.
    Euclidean,
}

impl DistanceMetric {
    /// Distance between `a` and `b`; lower means more similar.
    pub fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            Self::Cosine => 1.0 - cosine_similarity(a, b),
            Self::Euclidean => {
                a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum::<f32>().sqrt()
            }
        }
    }
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 if either vector has zero magnitude.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// The document and chunking an index was built from.
///
/// Stored alongside the entries so a later process can tell whether the
/// persisted index still matches an upload without re-embedding it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSource {
    /// SHA-256 hex digest of the raw document bytes.
    pub content_hash: String,
    /// Declared document format.
    pub format: DocumentFormat,
    /// Chunk size the document was split with.
    pub chunk_size: usize,
    /// Chunk overlap the document was split with.
    pub chunk_overlap: usize,
}

/// A collection of chunks and their embeddings, searchable by vector distance.
///
/// Entries keep the chunk order they were built with; that order breaks
/// distance ties during search.
///
/// # Example
///
/// ```rust,ignore
/// use minirag::{DistanceMetric, VectorIndex};
///
/// let index = VectorIndex::build(chunks, &provider, DistanceMetric::Cosine).await?;
/// index.persist("vector_store")?;
/// let reloaded = VectorIndex::load("vector_store")?;
/// assert_eq!(index, reloaded);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VectorIndex {
    format_version: u32,
    embedding_model: String,
    dimensions: usize,
    metric: DistanceMetric,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    source: Option<IndexSource>,
    entries: Vec<IndexedChunk>,
}

impl VectorIndex {
    /// Embed every chunk and assemble a fresh index.
    ///
    /// The build is all-or-nothing: if the provider fails, returns the wrong
    /// number of vectors, or returns vectors of inconsistent or non-finite
    /// values, no index is produced. An empty chunk list yields an empty index
    /// without calling the provider.
    ///
    /// # Errors
    ///
    /// - [`RagError::EmbeddingFailure`] for any embedding problem
    /// - [`RagError::InvalidConfiguration`] if two chunks share an ID
    pub async fn build(
        chunks: Vec<Chunk>,
        provider: &dyn EmbeddingProvider,
        metric: DistanceMetric,
    ) -> Result<Self> {
        if chunks.is_empty() {
            info!(provider = provider.name(), "built empty index");
            return Ok(Self::empty(provider.name(), provider.dimensions(), metric));
        }

        let mut seen = HashSet::with_capacity(chunks.len());
        if let Some(duplicate) = chunks.iter().find(|c| !seen.insert(c.id.as_str())) {
            return Err(RagError::InvalidConfiguration(format!(
                "duplicate chunk id '{}'",
                duplicate.id
            )));
        }

        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        let embeddings = provider.embed_batch(&texts).await.map_err(|e| {
            error!(provider = provider.name(), error = %e, "embedding failed during index build");
            e
        })?;

        let failure = |message: String| {
            error!(provider = provider.name(), %message, "rejected embeddings");
            RagError::EmbeddingFailure { provider: provider.name().to_string(), message }
        };

        if embeddings.len() != chunks.len() {
            return Err(failure(format!(
                "returned {} vectors for {} chunks",
                embeddings.len(),
                chunks.len()
            )));
        }

        let dimensions = embeddings[0].len();
        if dimensions == 0 {
            return Err(failure("returned empty vectors".to_string()));
        }
        if let Some(i) = embeddings.iter().position(|v| v.len() != dimensions) {
            return Err(failure(format!(
                "vector {i} has {} dimensions, expected {dimensions}",
                embeddings[i].len()
            )));
        }
        if let Some(i) = embeddings.iter().position(|v| v.iter().any(|x| !x.is_finite())) {
            return Err(failure(format!("vector {i} contains non-finite values")));
        }
        if dimensions != provider.dimensions() {
            warn!(
                provider = provider.name(),
                reported = provider.dimensions(),
                actual = dimensions,
                "provider dimensions differ from returned vectors"
            );
        }

        let entries: Vec<IndexedChunk> = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| IndexedChunk { chunk, embedding })
            .collect();

        info!(provider = provider.name(), chunk_count = entries.len(), dimensions, "built index");

        Ok(Self {
            format_version: INDEX_FORMAT_VERSION,
            embedding_model: provider.name().to_string(),
            dimensions,
            metric,
            source: None,
            entries,
        })
    }

    /// An index with no entries.
    pub fn empty(
        embedding_model: impl Into<String>,
        dimensions: usize,
        metric: DistanceMetric,
    ) -> Self {
        Self {
            format_version: INDEX_FORMAT_VERSION,
            embedding_model: embedding_model.into(),
            dimensions,
            metric,
            source: None,
            entries: Vec::new(),
        }
    }

    /// Record the document and chunking this index was built from.
    pub fn with_source(mut self, source: IndexSource) -> Self {
        self.source = Some(source);
        self
    }

    /// The recorded source, if any.
    pub fn source(&self) -> Option<&IndexSource> {
        self.source.as_ref()
    }

    /// Identifier of the embedding provider the index was built with.
    pub fn embedding_model(&self) -> &str {
        &self.embedding_model
    }

    /// Number of components in every stored vector.
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// The metric used by [`search`](Self::search).
    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    /// Number of stored chunks.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the index holds no chunks.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Stored entries in insertion order.
    pub fn entries(&self) -> &[IndexedChunk] {
        &self.entries
    }

    /// Look up a stored entry by chunk ID.
    pub fn get(&self, chunk_id: &str) -> Option<&IndexedChunk> {
        self.entries.iter().find(|entry| entry.chunk.id == chunk_id)
    }

    /// Return the `k` entries closest to `query`, nearest first.
    ///
    /// Ties keep insertion order. Returns every entry when `k` exceeds the
    /// index size and nothing for an empty index or `k == 0`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::EmbeddingFailure`] if `query` does not have
    /// [`dimensions`](Self::dimensions) components, which means it was produced
    /// in a different embedding space.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchResult>> {
        if self.entries.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        if query.len() != self.dimensions {
            return Err(RagError::EmbeddingFailure {
                provider: self.embedding_model.clone(),
                message: format!(
                    "query vector has {} dimensions, index has {}",
                    query.len(),
                    self.dimensions
                ),
            });
        }

        let mut scored: Vec<SearchResult> = self
            .entries
            .iter()
            .map(|entry| SearchResult {
                chunk: entry.chunk.clone(),
                distance: self.metric.distance(&entry.embedding, query),
            })
            .collect();

        scored.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        scored.truncate(k);
        Ok(scored)
    }

    /// Path of the index file inside `dir`.
    pub fn index_file(dir: impl AsRef<Path>) -> PathBuf {
        dir.as_ref().join(INDEX_FILE_NAME)
    }

    /// Write the index to `dir/index.json`, creating `dir` if needed.
    ///
    /// The file is written to a temporary sibling and renamed into place, so
    /// readers see either the previous index or the new one, never a partial
    /// write. Returns the path of the written file. This is blocking I/O.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::StorageFailure`] if the directory or file cannot be written.
    pub fn persist(&self, dir: impl AsRef<Path>) -> Result<PathBuf> {
        let dir = dir.as_ref();
        let path = Self::index_file(dir);
        let storage = |message: String| {
            error!(path = %path.display(), %message, "failed to persist index");
            RagError::StorageFailure { path: path.clone(), message }
        };

        std::fs::create_dir_all(dir)
            .map_err(|e| storage(format!("failed to create directory: {e}")))?;
        let bytes =
            serde_json::to_vec(self).map_err(|e| storage(format!("failed to serialize: {e}")))?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir)
            .map_err(|e| storage(format!("failed to create temp file: {e}")))?;
        tmp.write_all(&bytes).map_err(|e| storage(format!("failed to write: {e}")))?;
        tmp.as_file().sync_all().map_err(|e| storage(format!("failed to sync: {e}")))?;
        tmp.persist(&path).map_err(|e| storage(format!("failed to move into place: {e}")))?;

        info!(path = %path.display(), chunk_count = self.len(), "persisted index");
        Ok(path)
    }

    /// Read an index previously written by [`persist`](Self::persist).
    ///
    /// This is blocking I/O.
    ///
    /// # Errors
    ///
    /// - [`RagError::IndexNotFound`] if `dir/index.json` does not exist
    /// - [`RagError::IndexCorrupt`] if it cannot be decoded, has an unknown
    ///   format version, or breaks an index invariant
    /// - [`RagError::StorageFailure`] if it exists but cannot be read
    pub fn load(dir: impl AsRef<Path>) -> Result<Self> {
        let path = Self::index_file(dir);
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no persisted index");
                return Err(RagError::IndexNotFound { path });
            }
            Err(e) => {
                error!(path = %path.display(), error = %e, "failed to read index");
                let message = format!("failed to read: {e}");
                return Err(RagError::StorageFailure { path, message });
            }
        };

        let index: VectorIndex = serde_json::from_slice(&bytes).map_err(|e| {
            error!(path = %path.display(), error = %e, "failed to decode index");
            RagError::IndexCorrupt { path: path.clone(), message: format!("failed to decode: {e}") }
        })?;

        if let Err(message) = index.check_invariants() {
            error!(path = %path.display(), %message, "index violates invariants");
            return Err(RagError::IndexCorrupt { path, message });
        }

        info!(path = %path.display(), chunk_count = index.len(), "loaded index");
        Ok(index)
    }

    fn check_invariants(&self) -> std::result::Result<(), String> {
        if self.format_version != INDEX_FORMAT_VERSION {
            return Err(format!(
                "unsupported format version {} (expected {INDEX_FORMAT_VERSION})",
                self.format_version
            ));
        }

        if self.dimensions == 0 && !self.entries.is_empty() {
            return Err("zero dimensions with stored entries".to_string());
        }

        let mut seen = HashSet::with_capacity(self.entries.len());
        for entry in &self.entries {
            if entry.embedding.len() != self.dimensions {
                return Err(format!(
                    "chunk '{}' has {} dimensions, index has {}",
                    entry.chunk.id,
                    entry.embedding.len(),
                    self.dimensions
                ));
            }
            if entry.embedding.iter().any(|x| !x.is_finite()) {
                return Err(format!("chunk '{}' has non-finite values", entry.chunk.id));
            }
            if !seen.insert(entry.chunk.id.as_str()) {
                return Err(format!("duplicate chunk id '{}'", entry.chunk.id));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_distance_of_parallel_vectors_is_zero() {
        let d = DistanceMetric::Cosine.distance(&[1.0, 2.0], &[2.0, 4.0]);
        assert!(d.abs() < 1e-6);
        assert_eq!(DistanceMetric::Cosine.distance(&[0.0, 0.0], &[1.0, 0.0]), 1.0);
    }

    #[test]
    fn euclidean_distance() {
        let d = DistanceMetric::Euclidean.distance(&[0.0, 0.0], &[3.0, 4.0]);
        assert!((d - 5.0).abs() < 1e-6);
    }

    #[test]
    fn empty_index_searches_to_nothing() {
        let index = VectorIndex::empty("test", 4, DistanceMetric::Cosine);
        assert!(index.search(&[1.0, 0.0, 0.0, 0.0], 3).unwrap().is_empty());
        assert!(index.search(&[1.0], 3).unwrap().is_empty());
    }

    #[test]
    fn unsupported_version_is_an_invariant_violation() {
        let mut index = VectorIndex::empty("test", 4, DistanceMetric::Cosine);
        index.format_version = 99;
        assert!(index.check_invariants().is_err());
    }

    #[test]
    fn source_is_omitted_until_recorded() {
        let index = VectorIndex::empty("test", 4, DistanceMetric::Cosine);
        let json = serde_json::to_value(&index).unwrap();
        assert!(json.get("source").is_none());

        let source = IndexSource {
            content_hash: "abc".to_string(),
            format: DocumentFormat::Text,
            chunk_size: 500,
            chunk_overlap: 100,
        };
        let index = index.with_source(source.clone());
        let decoded: VectorIndex = serde_json::from_value(serde_json::to_value(&index).unwrap())
            .unwrap();
        assert_eq!(decoded.source(), Some(&source));
    }
}
