//! Storage Module
//!
//! SQLite-based storage layer with:
//! - FTS5 full-text search with query sanitization (content records)
//! - Embedded HNSW vector index (semantic search)
//! - Versioned schema migrations
//! - Writer/reader connection split for concurrent read access

mod migrations;
mod sqlite;

pub use migrations::{apply_migrations, Migration, MIGRATIONS};
pub use sqlite::{Result, Storage, StorageError};
