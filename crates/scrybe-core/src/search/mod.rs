//! Search Module
//!
//! Provides the retrieval building blocks:
//! - Vector search using HNSW (USearch)
//! - Keyword search using BM25/FTS5
//! - Hybrid search with RRF fusion
//! - Temporal-aware (timeline) search

mod hybrid;
mod keyword;
mod temporal;
mod vector;

pub use vector::{
    VectorIndex, VectorIndexConfig, VectorIndexStats, VectorSearchError, DEFAULT_CONNECTIVITY,
    DEFAULT_DIMENSIONS,
};

pub use keyword::{sanitize_fts5_query, KeywordSearcher};

pub use hybrid::{linear_combination, reciprocal_rank_fusion, HybridSearchConfig, HybridSearcher};

pub use temporal::TemporalSearcher;
