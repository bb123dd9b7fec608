//! Single-document retrieval-augmented question answering.
//!
//! This crate provides:
//! - Text extraction from PDF, DOCX, and plain-text uploads
//! - Recursive, overlap-preserving chunking
//! - An exact nearest-neighbour [`VectorIndex`] with JSON persistence
//! - Query-time retrieval and prompt-based answer generation
//! - A [`RagPipeline`] tying the stages together behind a single-slot cache
//!
//! Embedding and text generation are pluggable through the
//! [`EmbeddingProvider`] and [`TextGenerator`] traits. The `ollama` and
//! `openai` features add HTTP-backed implementations; the built-in
//! [`HashingEmbeddingProvider`] needs no model at all.
//!
//! # Feature flags
//!
//! | Feature  | Enables                                              |
//! |----------|------------------------------------------------------|
//! | `pdf`    | PDF text extraction (default)                        |
//! | `docx`   | DOCX text extraction (default)                       |
//! | `ollama` | [`ollama::OllamaEmbeddingProvider`], [`ollama::OllamaGenerator`] |
//! | `openai` | [`openai::OpenAIEmbeddingProvider`], [`openai::OpenAICompletionGenerator`] |

pub mod cache;
pub mod chunking;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod generation;
pub mod index;
pub mod loader;
pub mod pipeline;
pub mod retriever;

#[cfg(feature = "ollama")]
pub mod ollama;
#[cfg(feature = "openai")]
pub mod openai;

#[cfg(all(test, any(feature = "ollama", feature = "openai")))]
mod test_server;

pub use cache::{CacheKey, IndexCache};
pub use chunking::{Chunker, RecursiveChunker, chunk_text};
pub use config::{RagConfig, RagConfigBuilder};
pub use document::{Chunk, Document, DocumentFormat, IndexedChunk, SearchResult};
pub use embedding::{EmbeddingProvider, HashingEmbeddingProvider};
pub use error::{RagError, Result};
pub use generation::{AnswerGenerator, GenerationConfig, TextGenerator, compose_prompt};
pub use index::{DistanceMetric, IndexSource, VectorIndex};
pub use loader::{load_document, load_file};
pub use pipeline::{Answer, RagPipeline, RagPipelineBuilder};
pub use retriever::{Retriever, join_context};
