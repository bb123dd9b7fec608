//! Single-slot cache of the most recently built index.

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::debug;

use crate::document::{Document, DocumentFormat};
use crate::index::VectorIndex;

/// Identifies the source a cached index was built from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// SHA-256 hex digest of the raw document bytes.
    pub content_hash: String,
    /// Declared document format.
    pub format: DocumentFormat,
}

impl CacheKey {
    /// The key for `document`.
    pub fn for_document(document: &Document) -> Self {
        Self { content_hash: document.content_hash.clone(), format: document.format }
    }
}

/// Holds at most one `(key, index)` pair; inserting replaces it.
///
/// Re-uploading the same file reuses the built index, while any new upload
/// evicts the previous one.
#[derive(Debug, Default)]
pub struct IndexCache {
    slot: RwLock<Option<(CacheKey, Arc<VectorIndex>)>>,
}

impl IndexCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached index if it was built from `key`.
    pub async fn get(&self, key: &CacheKey) -> Option<Arc<VectorIndex>> {
        let slot = self.slot.read().await;
        match slot.as_ref() {
            Some((cached, index)) if cached == key => {
                debug!(content_hash = %key.content_hash, "index cache hit");
                Some(Arc::clone(index))
            }
            _ => None,
        }
    }

    /// The cached index regardless of its key.
    pub async fn current(&self) -> Option<Arc<VectorIndex>> {
        self.slot.read().await.as_ref().map(|(_, index)| Arc::clone(index))
    }

    /// Store `index` under `key`, evicting whatever was cached.
    pub async fn insert(&self, key: CacheKey, index: Arc<VectorIndex>) {
        debug!(content_hash = %key.content_hash, format = %key.format, "index cache replaced");
        *self.slot.write().await = Some((key, index));
    }

    /// Drop the cached index.
    pub async fn clear(&self) {
        *self.slot.write().await = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::DistanceMetric;

    fn key(hash: &str) -> CacheKey {
        CacheKey { content_hash: hash.to_string(), format: DocumentFormat::Text }
    }

    #[tokio::test]
    async fn new_upload_replaces_the_slot() {
        let cache = IndexCache::new();
        let first = Arc::new(VectorIndex::empty("a", 4, DistanceMetric::Cosine));
        let second = Arc::new(VectorIndex::empty("b", 4, DistanceMetric::Cosine));

        cache.insert(key("one"), Arc::clone(&first)).await;
        assert!(cache.get(&key("one")).await.is_some());

        cache.insert(key("two"), Arc::clone(&second)).await;
        assert!(cache.get(&key("one")).await.is_none());
        assert_eq!(cache.get(&key("two")).await.unwrap().embedding_model(), "b");

        cache.clear().await;
        assert!(cache.current().await.is_none());
    }

    #[tokio::test]
    async fn format_is_part_of_the_key() {
        let cache = IndexCache::new();
        let index = Arc::new(VectorIndex::empty("a", 4, DistanceMetric::Cosine));
        cache.insert(key("same"), index).await;
        let pdf = CacheKey { content_hash: "same".to_string(), format: DocumentFormat::Pdf };
        assert!(cache.get(&pdf).await.is_none());
    }
}
