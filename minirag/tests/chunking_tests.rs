//! Property tests for recursive chunking.

use minirag::chunking::{Chunker, RecursiveChunker, chunk_text};
use minirag::document::{Chunk, Document};
use minirag::error::RagError;
use proptest::prelude::*;

/// Text built from words, sentence ends, line breaks, and the odd multi-byte character.
fn arb_text() -> impl Strategy<Value = String> {
    proptest::collection::vec(
        prop_oneof![
            6 => "[a-z]{1,12}",
            2 => Just(" ".to_string()),
            1 => Just(". ".to_string()),
            1 => Just("\n".to_string()),
            1 => Just("\n\n".to_string()),
            1 => Just("é€😀".to_string()),
        ],
        0..200,
    )
    .prop_map(|parts| parts.concat())
}

/// A valid `(chunk_size, overlap)` pair.
fn arb_sizes() -> impl Strategy<Value = (usize, usize)> {
    (1usize..120).prop_flat_map(|size| (Just(size), 0..size))
}

fn chars(s: &str) -> Vec<char> {
    s.chars().collect()
}

fn reconstruct(chunks: &[Chunk]) -> String {
    chunks.iter().map(Chunk::novel_text).collect()
}

mod prop_chunking {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn chunks_reconstruct_the_text(text in arb_text(), (size, overlap) in arb_sizes()) {
            let chunks = chunk_text(&text, size, overlap).unwrap();
            prop_assert_eq!(reconstruct(&chunks), text.clone());
            prop_assert_eq!(chunks.is_empty(), text.is_empty());
        }

        #[test]
        fn chunks_never_exceed_chunk_size(text in arb_text(), (size, overlap) in arb_sizes()) {
            for chunk in chunk_text(&text, size, overlap).unwrap() {
                let len = chunk.text.chars().count();
                prop_assert!(len <= size, "chunk of {} chars exceeds {}", len, size);
                prop_assert!(len > 0);
            }
        }

        #[test]
        fn consecutive_chunks_share_exactly_the_overlap(
            text in arb_text(),
            (size, overlap) in arb_sizes(),
        ) {
            let chunks = chunk_text(&text, size, overlap).unwrap();
            for pair in chunks.windows(2) {
                let (prev, next) = (chars(&pair[0].text), chars(&pair[1].text));
                prop_assert_eq!(pair[1].overlap_with_previous, overlap);
                prop_assert!(prev.len() > overlap);
                prop_assert_eq!(&prev[prev.len() - overlap..], &next[..overlap]);
                prop_assert_eq!(
                    pair[1].source_offset,
                    pair[0].source_offset + prev.len() - overlap
                );
            }
        }

        #[test]
        fn sequence_indexes_are_contiguous(text in arb_text(), (size, overlap) in arb_sizes()) {
            let document = Document::from_text(text);
            let chunker = RecursiveChunker::new(size, overlap).unwrap();
            for (i, chunk) in chunker.chunk(&document).iter().enumerate() {
                prop_assert_eq!(chunk.sequence_index, i);
                prop_assert_eq!(&chunk.id, &format!("{}_{i}", document.id));
                prop_assert_eq!(&chunk.document_id, &document.id);
            }
        }

        #[test]
        fn overlap_not_below_size_is_rejected(size in 0usize..200, extra in 0usize..50) {
            let result = chunk_text("some text", size, size + extra);
            prop_assert!(matches!(result, Err(RagError::InvalidConfiguration(_))));
        }
    }
}

#[test]
fn default_sizes_keep_short_paragraphs_together() {
    let text = "Alpha paragraph about cats.\n\nBeta paragraph about dogs.\n\nGamma about birds.";
    let chunks = chunk_text(text, 500, 100).unwrap();
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].text, text);
}

#[test]
fn long_text_prefers_paragraph_breaks() {
    let first = "a".repeat(30);
    let second = "b".repeat(30);
    let text = format!("{first}\n\n{second}");
    let chunks = chunk_text(&text, 40, 5).unwrap();
    assert_eq!(chunks[0].text, format!("{first}\n\n"));
    assert_eq!(reconstruct(&chunks), text);
}
