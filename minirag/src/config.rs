//! Configuration for the RAG pipeline.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};
use crate::index::DistanceMetric;

/// Default maximum chunk size in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 500;
/// Default overlap between consecutive chunks in characters.
pub const DEFAULT_CHUNK_OVERLAP: usize = 100;
/// Default number of chunks retrieved per question.
pub const DEFAULT_TOP_K: usize = 3;
/// Default generation budget in tokens.
pub const DEFAULT_MAX_NEW_TOKENS: usize = 200;
/// Default directory the index is persisted to.
pub const DEFAULT_INDEX_DIR: &str = "vector_store";

/// Configuration parameters for the RAG pipeline.
///
/// Every field has a default, so a TOML file only needs the values it changes:
///
/// ```toml
/// chunk_size = 800
/// top_k = 5
/// index_dir = "/var/lib/minirag"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RagConfig {
    /// Maximum chunk size in characters.
    pub chunk_size: usize,
    /// Number of overlapping characters between consecutive chunks.
    pub chunk_overlap: usize,
    /// Number of nearest chunks fed to the generator as context.
    pub top_k: usize,
    /// Token budget for each generated answer.
    pub max_new_tokens: usize,
    /// Distance metric used when building and searching the index.
    pub metric: DistanceMetric,
    /// Directory holding the persisted index.
    pub index_dir: PathBuf,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            top_k: DEFAULT_TOP_K,
            max_new_tokens: DEFAULT_MAX_NEW_TOKENS,
            metric: DistanceMetric::default(),
            index_dir: PathBuf::from(DEFAULT_INDEX_DIR),
        }
    }
}

impl RagConfig {
    /// Create a new builder for constructing a [`RagConfig`].
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::default()
    }

    /// Parse and validate a configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidConfiguration`] if the text is not valid TOML
    /// or the resulting values fail [`validate`](Self::validate).
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: RagConfig = toml::from_str(text)
            .map_err(|e| RagError::InvalidConfiguration(format!("invalid TOML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse, and validate a TOML configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::StorageFailure`] if the file cannot be read, and
    /// [`RagError::InvalidConfiguration`] if its contents are invalid.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| RagError::StorageFailure {
            path: path.to_path_buf(),
            message: format!("failed to read config: {e}"),
        })?;
        Self::from_toml_str(&text)
    }

    /// Check that the parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidConfiguration`] if:
    /// - `chunk_size == 0`
    /// - `chunk_overlap >= chunk_size`
    /// - `top_k == 0`
    /// - `max_new_tokens == 0`
    pub fn validate(&self) -> Result<()> {
        validate_chunking(self.chunk_size, self.chunk_overlap)?;
        if self.top_k == 0 {
            return Err(RagError::InvalidConfiguration(
                "top_k must be greater than zero".to_string(),
            ));
        }
        if self.max_new_tokens == 0 {
            return Err(RagError::InvalidConfiguration(
                "max_new_tokens must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Validate a chunk size / overlap pair.
pub(crate) fn validate_chunking(chunk_size: usize, chunk_overlap: usize) -> Result<()> {
    if chunk_size == 0 {
        return Err(RagError::InvalidConfiguration(
            "chunk_size must be greater than zero".to_string(),
        ));
    }
    if chunk_overlap >= chunk_size {
        return Err(RagError::InvalidConfiguration(format!(
            "chunk_overlap ({chunk_overlap}) must be less than chunk_size ({chunk_size})"
        )));
    }
    Ok(())
}

/// Builder for constructing a validated [`RagConfig`].
#[derive(Debug, Clone, Default)]
pub struct RagConfigBuilder {
    config: RagConfig,
}

impl RagConfigBuilder {
    /// Set the maximum chunk size in characters.
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = size;
        self
    }

    /// Set the overlap between consecutive chunks in characters.
    pub fn chunk_overlap(mut self, overlap: usize) -> Self {
        self.config.chunk_overlap = overlap;
        self
    }

    /// Set the number of chunks retrieved per question.
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    /// Set the token budget for generated answers.
    pub fn max_new_tokens(mut self, tokens: usize) -> Self {
        self.config.max_new_tokens = tokens;
        self
    }

    /// Set the distance metric used by the index.
    pub fn metric(mut self, metric: DistanceMetric) -> Self {
        self.config.metric = metric;
        self
    }

    /// Set the directory the index is persisted to.
    pub fn index_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.index_dir = dir.into();
        self
    }

    /// Build the [`RagConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// See [`RagConfig::validate`].
    pub fn build(self) -> Result<RagConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
