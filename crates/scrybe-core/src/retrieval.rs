//! Retrieval Engine (C9)
//!
//! Composes `Storage`'s row-level reads into the operations callers actually
//! want: `search` (lexical), `semantic_search` (embed-then-vector-search,
//! falling back to lexical when no embedder is configured or the vector
//! index comes back empty), and pass-through access to `timeline`,
//! `entities`/`people`/`organizations`, and `relationships`.
//!
//! Deliberately thin: every method here is a handful of lines delegating to
//! `Storage`, which keeps the SQL and the composition logic in separate
//! places rather than growing one struct that does both.

use crate::model::{EntityAggregate, EntityKind, RelationshipGraph, SearchHit, SourceKind, StoreStats};
use crate::storage::{Storage, StorageError};

#[cfg(feature = "embeddings")]
use crate::embeddings::{Embedder, EmbeddingError};

#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum RetrievalError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[cfg(feature = "embeddings")]
    #[error("embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),
}

pub type Result<T> = std::result::Result<T, RetrievalError>;

/// Borrows the store and (optionally) a loaded embedder. Construct one per
/// query session, or keep one alive for the lifetime of a daemon/CLI
/// invocation; it holds no state of its own beyond the two references.
pub struct RetrievalEngine<'a> {
    storage: &'a Storage,
    #[cfg(feature = "embeddings")]
    embedder: Option<&'a Embedder>,
}

impl<'a> RetrievalEngine<'a> {
    #[cfg(feature = "embeddings")]
    pub fn new(storage: &'a Storage, embedder: Option<&'a Embedder>) -> Self {
        Self { storage, embedder }
    }

    #[cfg(not(feature = "embeddings"))]
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    /// Lexical (BM25/FTS5) search.
    pub fn search(&self, query: &str, source: Option<SourceKind>, limit: usize) -> Result<Vec<SearchHit>> {
        Ok(self.storage.lexical_search(query, source, limit)?)
    }

    /// Embed `query` and run an ANN lookup; falls back to `search` when no
    /// embedder is configured, embedding fails, or the vector index returns
    /// nothing (e.g. it hasn't been populated yet).
    pub fn semantic_search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
        #[cfg(feature = "embeddings")]
        {
            if let Some(embedder) = self.embedder {
                match embedder.embed(query) {
                    Ok(embedding) => {
                        let hits = self.storage.vector_search(&embedding.vector, limit)?;
                        if !hits.is_empty() {
                            return Ok(hits);
                        }
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "query embedding failed, falling back to lexical search");
                    }
                }
            }
        }

        self.search(query, None, limit)
    }

    pub fn timeline(
        &self,
        days: u32,
        source: Option<SourceKind>,
        limit: usize,
    ) -> Result<Vec<crate::model::ContentRecord>> {
        Ok(self.storage.timeline(days, source, limit)?)
    }

    pub fn entities(&self, kind: Option<EntityKind>, limit: usize) -> Result<Vec<EntityAggregate>> {
        Ok(self.storage.entities(kind, limit)?)
    }

    pub fn people(&self, limit: usize) -> Result<Vec<EntityAggregate>> {
        Ok(self.storage.people(limit)?)
    }

    pub fn organizations(&self, limit: usize) -> Result<Vec<EntityAggregate>> {
        Ok(self.storage.organizations(limit)?)
    }

    pub fn relationships(&self, limit: usize) -> Result<RelationshipGraph> {
        Ok(self.storage.relationships(limit)?)
    }

    pub fn stats(&self) -> Result<StoreStats> {
        Ok(self.storage.stats()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::NullExtractor;

    fn test_storage() -> Storage {
        let dir = tempfile::tempdir().unwrap();
        Storage::new(Some(dir.path().join("test.db"))).unwrap()
    }

    #[test]
    fn semantic_search_falls_back_to_lexical_without_embedder() {
        let storage = test_storage();
        let extractor = NullExtractor;
        storage
            .add_content("quarterly report notes", SourceKind::Manual, None, serde_json::json!({}), &extractor)
            .unwrap();

        #[cfg(feature = "embeddings")]
        let engine = RetrievalEngine::new(&storage, None);
        #[cfg(not(feature = "embeddings"))]
        let engine = RetrievalEngine::new(&storage);

        let hits = engine.semantic_search("quarterly report", 5).unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn search_delegates_to_storage_lexical_search() {
        let storage = test_storage();
        let extractor = NullExtractor;
        storage
            .add_content("meeting notes about budget", SourceKind::Manual, None, serde_json::json!({}), &extractor)
            .unwrap();

        #[cfg(feature = "embeddings")]
        let engine = RetrievalEngine::new(&storage, None);
        #[cfg(not(feature = "embeddings"))]
        let engine = RetrievalEngine::new(&storage);

        let hits = engine.search("budget", None, 5).unwrap();
        assert_eq!(hits.len(), 1);
    }
}
