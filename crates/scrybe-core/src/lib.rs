//! Storage, retrieval, embedding, entity-extraction and privacy-filtering
//! core for the scrybe personal knowledge engine.
//!
//! This crate owns the single on-disk store (`storage`) and everything that
//! reads from or writes into it: the lexical/semantic search building
//! blocks (`search`), the composed retrieval operations (`retrieval`), local
//! text embeddings (`embeddings`), named-entity extraction (`entities`),
//! window/app suppression and PII redaction (`privacy`), and configuration
//! (`config`). Capture daemons, the RAG pipeline, and the CLI/app crates all
//! depend on this crate rather than touching SQLite directly.

pub mod config;
pub mod entities;
pub mod model;
pub mod privacy;
pub mod retrieval;
pub mod search;
pub mod storage;

#[cfg(feature = "embeddings")]
pub mod embeddings;

pub use config::Config;
pub use model::{
    CaptureMode, ClipboardEntry, ClipboardKind, ContentRecord, EmbeddingRecord, EntityAggregate,
    EntityEdge, EntityKind, EntityMention, EntityNode, FileEvent, FileKind, FileOperation,
    FileVersion, MatchType, RelationshipGraph, ScreenCapture, SearchHit, SourceKind, StoreStats,
};
pub use retrieval::{RetrievalEngine, RetrievalError};
pub use storage::{Storage, StorageError};
