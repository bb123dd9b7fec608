//! Data types for documents, chunks, and search results.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{RagError, Result};

/// The source type of an ingested document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    /// Portable Document Format.
    Pdf,
    /// Office Open XML word-processing document.
    Docx,
    /// Plain UTF-8 text.
    Text,
}

impl DocumentFormat {
    /// Resolve a format from a file extension (without the leading dot), case-insensitively.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::UnsupportedFormat`] for any extension other than
    /// `pdf`, `docx`, `txt`, `text`, or `md`.
    pub fn from_extension(extension: &str) -> Result<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "pdf" => Ok(Self::Pdf),
            "docx" => Ok(Self::Docx),
            "txt" | "text" | "md" => Ok(Self::Text),
            other => {
                Err(RagError::UnsupportedFormat(format!("'.{other}' files are not supported")))
            }
        }
    }

    /// Resolve a format from the extension of a path.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::UnsupportedFormat`] if the path has no extension or an unknown one.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let extension = path.extension().and_then(|ext| ext.to_str()).ok_or_else(|| {
            RagError::UnsupportedFormat(format!("{} has no file extension", path.display()))
        })?;
        Self::from_extension(extension)
    }

    /// The canonical lowercase name of the format.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Docx => "docx",
            Self::Text => "text",
        }
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A source document whose text has been extracted by the loader.
///
/// Documents are transient: they exist for the duration of one ingestion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// Identifier derived from the content hash.
    pub id: String,
    /// The extracted text content of the document.
    pub text: String,
    /// The declared source type.
    pub format: DocumentFormat,
    /// Full SHA-256 hex digest of the raw bytes the document was loaded from.
    pub content_hash: String,
    /// Key-value metadata associated with the document.
    pub metadata: HashMap<String, String>,
    /// Optional URI pointing to the original source.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_uri: Option<String>,
}

impl Document {
    /// Create a document from raw bytes that have already been converted to `text`.
    pub fn from_parts(raw: &[u8], text: String, format: DocumentFormat) -> Self {
        let content_hash = content_hash(raw);
        let mut metadata = HashMap::new();
        metadata.insert("format".to_string(), format.to_string());
        Self {
            id: content_hash.chars().take(16).collect(),
            text,
            format,
            content_hash,
            metadata,
            source_uri: None,
        }
    }

    /// Create a plain-text document, hashing the text itself.
    pub fn from_text(text: impl Into<String>) -> Self {
        let text = text.into();
        Self::from_parts(text.as_bytes(), text.clone(), DocumentFormat::Text)
    }

    /// Attach the original file name or URI.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        let source = source.into();
        self.metadata.insert("source".to_string(), source.clone());
        self.source_uri = Some(source);
        self
    }
}

/// SHA-256 hex digest of `bytes`.
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// A contiguous segment of a [`Document`]'s text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    /// Unique identifier, `{document_id}_{sequence_index}`.
    pub id: String,
    /// The ID of the parent [`Document`].
    pub document_id: String,
    /// The text content of the chunk.
    pub text: String,
    /// Position among the document's chunks, starting at zero.
    pub sequence_index: usize,
    /// Character offset of the chunk's first character in the document text.
    pub source_offset: usize,
    /// Number of leading characters shared with the preceding chunk.
    pub overlap_with_previous: usize,
    /// Metadata inherited from the parent document plus `chunk_index`.
    pub metadata: HashMap<String, String>,
}

impl Chunk {
    /// The part of the chunk that is not repeated from its predecessor.
    pub fn novel_text(&self) -> &str {
        match self.text.char_indices().nth(self.overlap_with_previous) {
            Some((byte, _)) => &self.text[byte..],
            None => "",
        }
    }
}

/// A [`Chunk`] paired with its embedding vector.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexedChunk {
    /// The stored chunk.
    pub chunk: Chunk,
    /// The embedding of the chunk's text.
    pub embedding: Vec<f32>,
}

/// A retrieved [`Chunk`] paired with its distance to the query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResult {
    /// The retrieved chunk.
    pub chunk: Chunk,
    /// Distance to the query vector (lower is more relevant).
    pub distance: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_from_extension_is_case_insensitive() {
        assert_eq!(DocumentFormat::from_extension("PDF").unwrap(), DocumentFormat::Pdf);
        assert_eq!(DocumentFormat::from_extension("docx").unwrap(), DocumentFormat::Docx);
        assert_eq!(DocumentFormat::from_extension("Txt").unwrap(), DocumentFormat::Text);
        assert!(matches!(
            DocumentFormat::from_extension("xlsx"),
            Err(RagError::UnsupportedFormat(_))
        ));
        assert!(matches!(
            DocumentFormat::from_path("notes"),
            Err(RagError::UnsupportedFormat(_))
        ));
        assert_eq!(DocumentFormat::from_path("data/input.pdf").unwrap(), DocumentFormat::Pdf);
    }

    #[test]
    fn document_id_is_stable_prefix_of_content_hash() {
        let a = Document::from_text("same text");
        let b = Document::from_text("same text");
        assert_eq!(a.id, b.id);
        assert_eq!(a.id.len(), 16);
        assert!(a.content_hash.starts_with(&a.id));
        assert_eq!(a.metadata.get("format").map(String::as_str), Some("text"));
    }

    #[test]
    fn novel_text_skips_shared_prefix_by_characters() {
        let chunk = Chunk {
            id: "d_1".into(),
            document_id: "d".into(),
            text: "héllo world".into(),
            sequence_index: 1,
            source_offset: 6,
            overlap_with_previous: 2,
            metadata: HashMap::new(),
        };
        assert_eq!(chunk.novel_text(), "llo world");
    }
}
