//! Document chunking.
//!
//! This module provides the [`Chunker`] trait and [`RecursiveChunker`], which
//! cuts text into bounded, overlapping windows and prefers to end each window
//! on a natural boundary: paragraph, then line, then sentence, then word, and
//! finally a raw character position.
//!
//! Sizes are counted in characters, not bytes, so multi-byte text is never
//! split inside a code point.

use crate::config::validate_chunking;
use crate::document::{Chunk, Document};
use crate::error::Result;

/// Boundary separators, coarsest first. Separators within one level compete on position.
const BOUNDARY_LEVELS: &[&[&str]] = &[&["\n\n"], &["\n"], &[". ", "! ", "? "], &[" ", "\t"]];

/// A strategy for splitting documents into chunks.
pub trait Chunker: Send + Sync {
    /// Split a document into chunks.
    ///
    /// Returns an empty `Vec` if the document has empty text.
    fn chunk(&self, document: &Document) -> Vec<Chunk>;
}

/// Splits text into windows of at most `chunk_size` characters where each
/// window after the first repeats the last `chunk_overlap` characters of its
/// predecessor.
///
/// Chunk IDs are generated as `{document_id}_{sequence_index}`. Each chunk
/// inherits the parent document's metadata plus a `chunk_index` field.
///
/// # Example
///
/// ```rust,ignore
/// use minirag::RecursiveChunker;
///
/// let chunker = RecursiveChunker::new(500, 100)?;
/// let chunks = chunker.chunk(&document);
/// ```
#[derive(Debug, Clone)]
pub struct RecursiveChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl RecursiveChunker {
    /// Create a new `RecursiveChunker`.
    ///
    /// # Arguments
    ///
    /// * `chunk_size`: maximum number of characters per chunk
    /// * `chunk_overlap`: number of characters shared by consecutive chunks
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidConfiguration`](crate::RagError::InvalidConfiguration)
    /// if `chunk_size` is zero or `chunk_overlap >= chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        validate_chunking(chunk_size, chunk_overlap)?;
        Ok(Self { chunk_size, chunk_overlap })
    }

    /// Maximum number of characters per chunk.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Number of characters shared by consecutive chunks.
    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }
}

impl Chunker for RecursiveChunker {
    fn chunk(&self, document: &Document) -> Vec<Chunk> {
        let text = &document.text;
        let offsets = char_offsets(text);

        split_spans(text, &offsets, self.chunk_size, self.chunk_overlap)
            .into_iter()
            .enumerate()
            .map(|(i, (start, end))| {
                let mut metadata = document.metadata.clone();
                metadata.insert("chunk_index".to_string(), i.to_string());
                Chunk {
                    id: format!("{}_{i}", document.id),
                    document_id: document.id.clone(),
                    text: text[offsets[start]..offsets[end]].to_string(),
                    sequence_index: i,
                    source_offset: start,
                    overlap_with_previous: if i == 0 { 0 } else { self.chunk_overlap },
                    metadata,
                }
            })
            .collect()
    }
}

/// Split raw text into chunks without a surrounding [`Document`].
///
/// The document ID embedded in each chunk is derived from the text's hash.
///
/// # Errors
///
/// Returns [`RagError::InvalidConfiguration`](crate::RagError::InvalidConfiguration)
/// if `chunk_size` is zero or `overlap >= chunk_size`.
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Result<Vec<Chunk>> {
    let chunker = RecursiveChunker::new(chunk_size, overlap)?;
    Ok(chunker.chunk(&Document::from_text(text)))
}

/// Byte offset of every character boundary in `text`, including `text.len()`.
fn char_offsets(text: &str) -> Vec<usize> {
    text.char_indices().map(|(i, _)| i).chain(std::iter::once(text.len())).collect()
}

/// Compute `[start, end)` character ranges for each chunk.
fn split_spans(
    text: &str,
    offsets: &[usize],
    chunk_size: usize,
    chunk_overlap: usize,
) -> Vec<(usize, usize)> {
    let len = offsets.len() - 1;
    let mut spans = Vec::new();
    if len == 0 {
        return spans;
    }

    let mut start = 0;
    loop {
        if len - start <= chunk_size {
            spans.push((start, len));
            return spans;
        }

        // The break must leave more than `chunk_overlap` characters so the next window advances.
        let max_end = start + chunk_size;
        let min_end = start + chunk_overlap + 1;
        let end = find_boundary(text, offsets, start, min_end, max_end).unwrap_or(max_end);

        spans.push((start, end));
        start = end - chunk_overlap;
    }
}

/// Find the last natural boundary in `[min_end, max_end]`, trying coarse levels first.
///
/// Returns the character index just past the separator.
fn find_boundary(
    text: &str,
    offsets: &[usize],
    start: usize,
    min_end: usize,
    max_end: usize,
) -> Option<usize> {
    let base = offsets[start];
    let window = &text[base..offsets[max_end]];
    let floor = offsets[min_end];

    BOUNDARY_LEVELS
        .iter()
        .find_map(|separators| {
            separators
                .iter()
                .filter_map(|separator| {
                    let end = base + window.rfind(separator)? + separator.len();
                    (end >= floor).then_some(end)
                })
                .max()
        })
        .and_then(|byte| offsets.binary_search(&byte).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RagError;

    fn reconstruct(chunks: &[Chunk]) -> String {
        chunks.iter().map(Chunk::novel_text).collect()
    }

    #[test]
    fn empty_text_yields_no_chunks() {
        assert!(chunk_text("", 500, 100).unwrap().is_empty());
    }

    #[test]
    fn short_text_yields_single_chunk() {
        let chunks = chunk_text("A short note.", 500, 100).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "A short note.");
        assert_eq!(chunks[0].overlap_with_previous, 0);
        assert_eq!(chunks[0].source_offset, 0);
    }

    #[test]
    fn invalid_sizes_fail_fast() {
        assert!(matches!(chunk_text("abc", 10, 10), Err(RagError::InvalidConfiguration(_))));
        assert!(matches!(chunk_text("abc", 10, 25), Err(RagError::InvalidConfiguration(_))));
        assert!(matches!(chunk_text("abc", 0, 0), Err(RagError::InvalidConfiguration(_))));
    }

    #[test]
    fn prefers_paragraph_boundaries() {
        let text = format!("{}\n\n{}", "a".repeat(30), "b".repeat(30));
        let chunks = chunk_text(&text, 40, 5).unwrap();
        assert_eq!(chunks[0].text, format!("{}\n\n", "a".repeat(30)));
        assert_eq!(chunks[1].overlap_with_previous, 5);
        assert!(chunks[1].text.starts_with("aaa\n\n"));
        assert_eq!(reconstruct(&chunks), text);
    }

    #[test]
    fn falls_back_to_sentence_then_word_boundaries() {
        let text = "One two three. Four five six seven eight nine ten eleven.";
        let chunks = chunk_text(text, 20, 4).unwrap();
        assert_eq!(chunks[0].text, "One two three. ");

        let words = "alpha beta gamma delta epsilon zeta eta theta";
        let chunks = chunk_text(words, 18, 3).unwrap();
        assert_eq!(chunks[0].text, "alpha beta gamma ");
        assert!(chunks.iter().all(|c| c.text.chars().count() <= 18));
        assert_eq!(reconstruct(&chunks), words);
    }

    #[test]
    fn splits_unbroken_text_at_raw_characters() {
        let text = "x".repeat(25);
        let chunks = chunk_text(&text, 10, 2).unwrap();
        let lengths: Vec<usize> = chunks.iter().map(|c| c.text.len()).collect();
        assert_eq!(lengths, vec![10, 10, 9]);
        assert_eq!(chunks[1].source_offset, 8);
        assert_eq!(chunks[2].source_offset, 16);
        assert_eq!(reconstruct(&chunks), text);
    }

    #[test]
    fn counts_characters_not_bytes() {
        let text = "ééééé ééééé ééééé";
        let chunks = chunk_text(text, 8, 2).unwrap();
        assert!(chunks.iter().all(|c| c.text.chars().count() <= 8));
        assert_eq!(reconstruct(&chunks), text);
    }

    #[test]
    fn chunks_carry_ids_and_metadata() {
        let document =
            Document::from_text("first part. second part. third part.").with_source("a.txt");
        let chunks = RecursiveChunker::new(15, 3).unwrap().chunk(&document);
        assert!(chunks.len() > 1);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.id, format!("{}_{i}", document.id));
            assert_eq!(chunk.sequence_index, i);
            assert_eq!(chunk.metadata.get("chunk_index"), Some(&i.to_string()));
            assert_eq!(chunk.metadata.get("source").map(String::as_str), Some("a.txt"));
        }
    }
}
