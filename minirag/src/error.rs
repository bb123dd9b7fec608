//! Error types for the `minirag` crate.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while loading, indexing, retrieving, or answering.
#[derive(Debug, Error)]
pub enum RagError {
    /// Chunking, retrieval, or pipeline parameters are inconsistent.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The document type is not handled by the loader (or its feature is disabled).
    #[error("Unsupported document format: {0}")]
    UnsupportedFormat(String),

    /// A supported document could not be parsed into text.
    #[error("Failed to load {format} document: {message}")]
    DocumentLoad {
        /// The declared format of the document.
        format: String,
        /// A description of the failure.
        message: String,
    },

    /// The embedding capability failed or returned unusable vectors.
    #[error("Embedding failure ({provider}): {message}")]
    EmbeddingFailure {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// Reading or writing durable state failed.
    #[error("Storage failure at {}: {message}", path.display())]
    StorageFailure {
        /// The location that could not be read or written.
        path: PathBuf,
        /// A description of the failure.
        message: String,
    },

    /// No persisted index exists at the requested location.
    #[error("No index found at {}", path.display())]
    IndexNotFound {
        /// The location that was searched.
        path: PathBuf,
    },

    /// A persisted index exists but cannot be decoded or violates its invariants.
    #[error("Index at {} is corrupt: {message}", path.display())]
    IndexCorrupt {
        /// The location of the corrupt index.
        path: PathBuf,
        /// A description of what is wrong with it.
        message: String,
    },

    /// The text-generation capability failed or produced no answer.
    #[error("Generation failure ({provider}): {message}")]
    GenerationFailure {
        /// The generation backend that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },
}

impl RagError {
    /// Returns `true` when the caller can recover by rebuilding the index from the source document.
    pub fn is_rebuildable(&self) -> bool {
        matches!(self, RagError::IndexNotFound { .. } | RagError::IndexCorrupt { .. })
    }
}

/// A convenience result type for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_and_corrupt_indexes_are_rebuildable() {
        let missing = RagError::IndexNotFound { path: PathBuf::from("vector_store") };
        let corrupt =
            RagError::IndexCorrupt { path: PathBuf::from("vector_store"), message: "bad".into() };
        let storage =
            RagError::StorageFailure { path: PathBuf::from("vector_store"), message: "ro".into() };

        assert!(missing.is_rebuildable());
        assert!(corrupt.is_rebuildable());
        assert!(!storage.is_rebuildable());
        assert_eq!(missing.to_string(), "No index found at vector_store");
    }
}
