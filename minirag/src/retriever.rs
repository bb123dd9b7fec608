//! Query-time retrieval over a built [`VectorIndex`].

use std::sync::Arc;

use tracing::{info, warn};

use crate::document::SearchResult;
use crate::embedding::EmbeddingProvider;
use crate::error::Result;
use crate::index::VectorIndex;

/// Separator placed between chunk texts when building the generator context.
pub const CONTEXT_SEPARATOR: &str = "\n";

/// Embeds queries and looks up their nearest chunks.
///
/// The provider must be the one (same backend and model) the index was built
/// with. A mismatch in vector size is reported as an error by
/// [`VectorIndex::search`]; a mismatch in provider identity is only logged,
/// since two configurations may legitimately name the same model differently.
///
/// # Example
///
/// ```rust,ignore
/// let retriever = Retriever::new(Arc::new(provider));
/// let results = retriever.retrieve("What is discussed?", &index, 3).await?;
/// let context = join_context(&results);
/// ```
pub struct Retriever {
    embedding_provider: Arc<dyn EmbeddingProvider>,
}

impl Retriever {
    /// Create a retriever using the given embedding provider.
    pub fn new(embedding_provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self { embedding_provider }
    }

    /// Return up to `k` chunks nearest to `query`, nearest first.
    ///
    /// The index is only read, so repeated calls with the same query return
    /// identical results. An empty index returns an empty `Vec` without
    /// calling the provider.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::EmbeddingFailure`](crate::RagError::EmbeddingFailure)
    /// if the query cannot be embedded or lands in a different vector space.
    pub async fn retrieve(
        &self,
        query: &str,
        index: &VectorIndex,
        k: usize,
    ) -> Result<Vec<SearchResult>> {
        if index.is_empty() || k == 0 {
            info!(k, result_count = 0, "retrieval skipped: nothing to search");
            return Ok(Vec::new());
        }

        if index.embedding_model() != self.embedding_provider.name() {
            warn!(
                index_model = index.embedding_model(),
                query_model = self.embedding_provider.name(),
                "query provider differs from the one the index was built with"
            );
        }

        let query_embedding = self.embedding_provider.embed(query).await?;
        let results = index.search(&query_embedding, k)?;

        info!(k, result_count = results.len(), "retrieval completed");
        Ok(results)
    }
}

/// Concatenate retrieved chunk texts, in rank order, one per line.
pub fn join_context(results: &[SearchResult]) -> String {
    results.iter().map(|r| r.chunk.text.as_str()).collect::<Vec<_>>().join(CONTEXT_SEPARATOR)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::document::Chunk;

    fn result(text: &str, distance: f32) -> SearchResult {
        SearchResult {
            chunk: Chunk {
                id: text.to_string(),
                document_id: "doc".to_string(),
                text: text.to_string(),
                sequence_index: 0,
                source_offset: 0,
                overlap_with_previous: 0,
                metadata: HashMap::new(),
            },
            distance,
        }
    }

    #[test]
    fn context_joins_with_newlines_in_rank_order() {
        let results = vec![result("first", 0.1), result("second", 0.2), result("third", 0.3)];
        assert_eq!(join_context(&results), "first\nsecond\nthird");
        assert_eq!(join_context(&[]), "");
    }
}
