//! SQLite Storage Implementation (C1)
//!
//! Single embedded store exposing three logical indices under one
//! transactional envelope: a row store (this file's tables), a lexical
//! index (FTS5, kept in sync via triggers defined in `migrations.rs`), and
//! a vector index (USearch, opened in a separate in-memory/on-disk
//! structure keyed by content id).
//!
//! Uses separate reader/writer connections for interior mutability. All
//! methods take `&self`, making `Storage` `Send + Sync` so callers can share
//! it behind an `Arc` instead of an `Arc<Mutex<Storage>>`.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use directories::ProjectDirs;
use rusqlite::{params, Connection, OptionalExtension};

use crate::entities::EntityExtractor;
use crate::model::{
    ClipboardEntry, ClipboardKind, ContentRecord, EntityAggregate, EntityEdge, EntityKind,
    EntityMention, EntityNode, FileEvent, FileKind, FileOperation, FileVersion, MatchType,
    RelationshipGraph, ScreenCapture, SearchHit, SourceKind, StoreStats,
};
use crate::search::{KeywordSearcher, TemporalSearcher};

#[cfg(feature = "embeddings")]
use crate::embeddings::Embedder;

#[cfg(feature = "vector-search")]
use crate::search::VectorIndex;

// ============================================================================
// ERROR TYPES
// ============================================================================

/// Storage error type
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("initialization error: {0}")]
    Init(String),
    #[error("invariant violation: {0}")]
    Invariant(String),
}

pub type Result<T> = std::result::Result<T, StorageError>;

// ============================================================================
// STORAGE
// ============================================================================

pub struct Storage {
    writer: Mutex<Connection>,
    reader: Mutex<Connection>,
    #[cfg(feature = "vector-search")]
    vector_index: Mutex<VectorIndex>,
}

impl Storage {
    fn configure_connection(conn: &Connection) -> Result<()> {
        #[cfg(feature = "encryption")]
        {
            if let Ok(key) = std::env::var("SCRYBE_ENCRYPTION_KEY") {
                if !key.is_empty() {
                    conn.pragma_update(None, "key", &key)?;
                }
            }
        }

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA cache_size = -64000;
             PRAGMA temp_store = MEMORY;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;
             PRAGMA mmap_size = 268435456;",
        )?;

        Ok(())
    }

    /// Default `<data_dir>/capture.db` path, resolved via `ProjectDirs` with
    /// a literal `~/.unified-ai` fallback; the data directory and database
    /// file are restricted to owner-only on Unix.
    fn default_db_path() -> Result<PathBuf> {
        let data_dir = match ProjectDirs::from("com", "scrybe", "core") {
            Some(proj_dirs) => proj_dirs.data_dir().to_path_buf(),
            None => crate::config::Config::default_data_dir(),
        };

        std::fs::create_dir_all(&data_dir)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o700);
            let _ = std::fs::set_permissions(&data_dir, perms);
        }

        Ok(data_dir.join("capture.db"))
    }

    pub fn new(db_path: Option<PathBuf>) -> Result<Self> {
        let path = match db_path {
            Some(p) => p,
            None => Self::default_db_path()?,
        };

        let writer_conn = Connection::open(&path)?;

        #[cfg(unix)]
        if path.exists() {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            let _ = std::fs::set_permissions(&path, perms);
        }

        Self::configure_connection(&writer_conn)?;
        super::migrations::apply_migrations(&writer_conn)?;

        let reader_conn = Connection::open(&path)?;
        Self::configure_connection(&reader_conn)?;

        #[cfg(feature = "vector-search")]
        let vector_index = VectorIndex::new()
            .map_err(|e| StorageError::Init(format!("failed to create vector index: {e}")))?;

        let storage = Self {
            writer: Mutex::new(writer_conn),
            reader: Mutex::new(reader_conn),
            #[cfg(feature = "vector-search")]
            vector_index: Mutex::new(vector_index),
        };

        #[cfg(feature = "vector-search")]
        storage.load_embeddings_into_index()?;

        Ok(storage)
    }

    #[cfg(feature = "vector-search")]
    fn load_embeddings_into_index(&self) -> Result<()> {
        let reader = self
            .reader
            .lock()
            .map_err(|_| StorageError::Init("reader lock poisoned".into()))?;

        let mut stmt = reader.prepare("SELECT content_id, vector FROM embeddings")?;
        let rows: Vec<(i64, Vec<u8>)> = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .filter_map(|r| r.ok())
            .collect();
        drop(stmt);
        drop(reader);

        let mut index = self
            .vector_index
            .lock()
            .map_err(|_| StorageError::Init("vector index lock poisoned".into()))?;

        for (content_id, bytes) in rows {
            if let Some(embedding) = crate::embeddings::Embedding::from_bytes(&bytes) {
                if let Err(e) = index.add(&content_id.to_string(), &embedding.vector) {
                    tracing::warn!(content_id, error = %e, "failed to load embedding into vector index");
                }
            }
        }

        Ok(())
    }

    // ========================================================================
    // WRITE: unified content store
    // ========================================================================

    /// Mirror an observation into `ContentRecord`, extracting entities with
    /// `extractor` in the same transaction. `(source, source_ref)` must be
    /// unique; an existing row for that pair is returned unchanged (C8's
    /// idempotence requirement) rather than inserted again.
    pub fn add_content(
        &self,
        text: &str,
        source: SourceKind,
        source_ref: Option<i64>,
        metadata: serde_json::Value,
        extractor: &dyn EntityExtractor,
    ) -> Result<i64> {
        if text.is_empty() {
            return Err(StorageError::Invariant("content text must be non-empty".into()));
        }

        let mut writer = self
            .writer
            .lock()
            .map_err(|_| StorageError::Init("writer lock poisoned".into()))?;
        let tx = writer.transaction()?;

        if let Some(source_ref) = source_ref {
            let existing: Option<i64> = tx
                .query_row(
                    "SELECT id FROM content_records WHERE source = ?1 AND source_ref = ?2",
                    params![source.to_string(), source_ref],
                    |row| row.get(0),
                )
                .optional()?;
            if let Some(id) = existing {
                tx.commit()?;
                return Ok(id);
            }
        }

        let now = Utc::now();
        let metadata_json = serde_json::to_string(&metadata).unwrap_or_else(|_| "{}".into());

        tx.execute(
            "INSERT INTO content_records (text, source, source_ref, captured_at, metadata)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                text,
                source.to_string(),
                source_ref,
                now.to_rfc3339(),
                metadata_json
            ],
        )?;
        let content_id = tx.last_insert_rowid();

        if extractor.is_available() {
            for entity in extractor.extract(text) {
                tx.execute(
                    "INSERT INTO entity_mentions (content_id, text, kind, span_start, span_end, source_label)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        content_id,
                        entity.text,
                        entity.kind.to_string(),
                        entity.span_start as i64,
                        entity.span_end as i64,
                        entity.source_label,
                    ],
                )?;
            }
        }

        tx.commit()?;
        Ok(content_id)
    }

    /// Compute and persist an embedding for `content_id`. Best-effort: a
    /// failure here leaves the content lexically searchable only, per C1's
    /// documented degradation.
    #[cfg(feature = "embeddings")]
    pub fn add_embedding(
        &self,
        content_id: i64,
        text: &str,
        source: SourceKind,
        embedder: &Embedder,
    ) -> Result<()> {
        let embedding = embedder
            .embed(text)
            .map_err(|e| StorageError::Init(format!("embedding failed: {e}")))?;

        let truncated_text: String = text.chars().take(1000).collect();
        let now = Utc::now();

        {
            let writer = self
                .writer
                .lock()
                .map_err(|_| StorageError::Init("writer lock poisoned".into()))?;
            writer.execute(
                "INSERT OR REPLACE INTO embeddings
                     (content_id, vector, dimensions, model, truncated_text, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    content_id,
                    embedding.to_bytes(),
                    embedding.dimensions as i64,
                    embedder.model_name(),
                    truncated_text,
                    now.to_rfc3339(),
                ],
            )?;
        }

        let _ = source;

        #[cfg(feature = "vector-search")]
        {
            let mut index = self
                .vector_index
                .lock()
                .map_err(|_| StorageError::Init("vector index lock poisoned".into()))?;
            if let Err(e) = index.add(&content_id.to_string(), &embedding.vector) {
                tracing::warn!(content_id, error = %e, "failed to add embedding to vector index");
            }
        }

        Ok(())
    }

    // ========================================================================
    // WRITE: source tables
    // ========================================================================

    /// Insert a screen capture row. Rejects (returns `Ok(None)`) when
    /// `perceptual_hash` equals the immediately preceding capture's hash.
    pub fn add_screen_capture(
        &self,
        perceptual_hash: &str,
        extracted_text: &str,
        active_window: &str,
        active_app: &str,
        metadata: serde_json::Value,
    ) -> Result<Option<i64>> {
        let writer = self
            .writer
            .lock()
            .map_err(|_| StorageError::Init("writer lock poisoned".into()))?;

        let last_hash: Option<String> = writer
            .query_row(
                "SELECT perceptual_hash FROM screen_captures ORDER BY id DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?;
        if last_hash.as_deref() == Some(perceptual_hash) {
            return Ok(None);
        }

        let now = Utc::now();
        let metadata_json = serde_json::to_string(&metadata).unwrap_or_else(|_| "{}".into());
        writer.execute(
            "INSERT INTO screen_captures
                 (captured_at, perceptual_hash, extracted_text, active_window, active_app, metadata)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                now.to_rfc3339(),
                perceptual_hash,
                extracted_text,
                active_window,
                active_app,
                metadata_json
            ],
        )?;
        Ok(Some(writer.last_insert_rowid()))
    }

    /// Insert a clipboard entry row. Rejects when `content_hash` equals the
    /// immediately preceding entry's hash.
    pub fn add_clipboard_entry(
        &self,
        content_hash: &str,
        text: &str,
        classified_type: ClipboardKind,
        source_app: &str,
        metadata: serde_json::Value,
    ) -> Result<Option<i64>> {
        let writer = self
            .writer
            .lock()
            .map_err(|_| StorageError::Init("writer lock poisoned".into()))?;

        let last_hash: Option<String> = writer
            .query_row(
                "SELECT content_hash FROM clipboard_entries ORDER BY id DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?;
        if last_hash.as_deref() == Some(content_hash) {
            return Ok(None);
        }

        let now = Utc::now();
        let metadata_json = serde_json::to_string(&metadata).unwrap_or_else(|_| "{}".into());
        writer.execute(
            "INSERT INTO clipboard_entries
                 (captured_at, content_hash, text, classified_type, source_app, metadata)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                now.to_rfc3339(),
                content_hash,
                text,
                classified_type.to_string(),
                source_app,
                metadata_json
            ],
        )?;
        Ok(Some(writer.last_insert_rowid()))
    }

    /// Insert a file event row. For `modified`, also appends a new
    /// `FileVersion` whose `version` is `max(version for this path) + 1`.
    pub fn add_file_event(
        &self,
        file_path: &str,
        file_name: &str,
        operation: FileOperation,
        content_hash: Option<&str>,
        text: Option<&str>,
        kind: FileKind,
        size_bytes: Option<i64>,
        metadata: serde_json::Value,
    ) -> Result<i64> {
        let writer = self
            .writer
            .lock()
            .map_err(|_| StorageError::Init("writer lock poisoned".into()))?;

        let now = Utc::now();
        let metadata_json = serde_json::to_string(&metadata).unwrap_or_else(|_| "{}".into());
        writer.execute(
            "INSERT INTO file_events
                 (captured_at, file_path, file_name, operation, content_hash, text, kind, size_bytes, metadata)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                now.to_rfc3339(),
                file_path,
                file_name,
                operation.to_string(),
                content_hash,
                text,
                kind.to_string(),
                size_bytes,
                metadata_json
            ],
        )?;
        let event_id = writer.last_insert_rowid();

        if operation == FileOperation::Modified {
            if let Some(hash) = content_hash {
                let max_version: Option<i64> = writer
                    .query_row(
                        "SELECT MAX(version) FROM file_versions WHERE file_path = ?1",
                        params![file_path],
                        |row| row.get(0),
                    )
                    .optional()?
                    .flatten();
                let next_version = max_version.unwrap_or(0) + 1;

                writer.execute(
                    "INSERT INTO file_versions (file_path, version, content_hash, captured_at, size_bytes)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![file_path, next_version, hash, now.to_rfc3339(), size_bytes],
                )?;
            }
        }

        Ok(event_id)
    }

    // ========================================================================
    // READ: C1 operations
    // ========================================================================

    /// BM25-ranked lexical search, newest-first on ties. Tolerates a broken
    /// or absent FTS table by returning an empty result rather than an
    /// error.
    pub fn lexical_search(
        &self,
        query: &str,
        source: Option<SourceKind>,
        limit: usize,
    ) -> Result<Vec<SearchHit>> {
        let Some(match_expr) = KeywordSearcher::new().match_expression(query) else {
            return Ok(Vec::new());
        };

        let reader = self
            .reader
            .lock()
            .map_err(|_| StorageError::Init("reader lock poisoned".into()))?;

        let sql = if source.is_some() {
            "SELECT cr.id, cr.text, cr.source, cr.source_ref, cr.captured_at, cr.metadata, bm25(content_fts) as rank
             FROM content_fts
             JOIN content_records cr ON cr.id = content_fts.rowid
             WHERE content_fts MATCH ?1 AND cr.source = ?2
             ORDER BY rank ASC, cr.captured_at DESC
             LIMIT ?3"
        } else {
            "SELECT cr.id, cr.text, cr.source, cr.source_ref, cr.captured_at, cr.metadata, bm25(content_fts) as rank
             FROM content_fts
             JOIN content_records cr ON cr.id = content_fts.rowid
             WHERE content_fts MATCH ?1
             ORDER BY rank ASC, cr.captured_at DESC
             LIMIT ?2"
        };

        let mut stmt = match reader.prepare(sql) {
            Ok(stmt) => stmt,
            Err(_) => return Ok(Vec::new()),
        };

        let rows = if let Some(source) = source {
            stmt.query_map(params![match_expr, source.to_string(), limit as i64], row_to_search_hit)
        } else {
            stmt.query_map(params![match_expr, limit as i64], row_to_search_hit)
        };

        let hits = match rows {
            Ok(rows) => rows.filter_map(|r| r.ok()).collect(),
            Err(_) => Vec::new(),
        };
        Ok(hits)
    }

    /// ANN lookup over `Embedding`, joined back to full `ContentRecord`s.
    /// Returns an empty list (never an error) when the vector index feature
    /// is disabled or the index is empty.
    #[cfg(feature = "vector-search")]
    pub fn vector_search(&self, query_vector: &[f32], limit: usize) -> Result<Vec<SearchHit>> {
        let index = self
            .vector_index
            .lock()
            .map_err(|_| StorageError::Init("vector index lock poisoned".into()))?;

        let neighbors = index
            .search(query_vector, limit)
            .map_err(|e| StorageError::Init(format!("vector search failed: {e}")))?;
        drop(index);

        if neighbors.is_empty() {
            return Ok(Vec::new());
        }

        let mut hits = Vec::with_capacity(neighbors.len());
        for (key, similarity) in neighbors {
            let Ok(content_id) = key.parse::<i64>() else {
                continue;
            };
            if let Some(record) = self.get_by_id(content_id)? {
                hits.push(SearchHit {
                    record,
                    score: 1.0 - similarity,
                    match_type: MatchType::Semantic,
                });
            }
        }
        Ok(hits)
    }

    #[cfg(not(feature = "vector-search"))]
    pub fn vector_search(&self, _query_vector: &[f32], _limit: usize) -> Result<Vec<SearchHit>> {
        Ok(Vec::new())
    }

    pub fn get_by_id(&self, id: i64) -> Result<Option<ContentRecord>> {
        let reader = self
            .reader
            .lock()
            .map_err(|_| StorageError::Init("reader lock poisoned".into()))?;

        reader
            .query_row(
                "SELECT id, text, source, source_ref, captured_at, metadata
                 FROM content_records WHERE id = ?1",
                params![id],
                row_to_content_record,
            )
            .optional()
            .map_err(StorageError::from)
    }

    /// Records captured within `[now - days, now]`, newest first.
    pub fn timeline(
        &self,
        days: u32,
        source: Option<SourceKind>,
        limit: usize,
    ) -> Result<Vec<ContentRecord>> {
        let cutoff = TemporalSearcher::new().cutoff(days, Utc::now());

        let reader = self
            .reader
            .lock()
            .map_err(|_| StorageError::Init("reader lock poisoned".into()))?;

        let sql = if source.is_some() {
            "SELECT id, text, source, source_ref, captured_at, metadata FROM content_records
             WHERE captured_at >= ?1 AND source = ?2
             ORDER BY captured_at DESC, id ASC LIMIT ?3"
        } else {
            "SELECT id, text, source, source_ref, captured_at, metadata FROM content_records
             WHERE captured_at >= ?1
             ORDER BY captured_at DESC, id ASC LIMIT ?2"
        };

        let mut stmt = reader.prepare(sql)?;
        let rows = if let Some(source) = source {
            stmt.query_map(
                params![cutoff.to_rfc3339(), source.to_string(), limit as i64],
                row_to_content_record,
            )?
            .filter_map(|r| r.ok())
            .collect()
        } else {
            stmt.query_map(params![cutoff.to_rfc3339(), limit as i64], row_to_content_record)?
                .filter_map(|r| r.ok())
                .collect()
        };

        Ok(rows)
    }

    pub fn list_entities(&self, kind: Option<EntityKind>, limit: usize) -> Result<Vec<EntityMention>> {
        let reader = self
            .reader
            .lock()
            .map_err(|_| StorageError::Init("reader lock poisoned".into()))?;

        let sql = if kind.is_some() {
            "SELECT id, content_id, text, kind, span_start, span_end, source_label
             FROM entity_mentions WHERE kind = ?1 ORDER BY id DESC LIMIT ?2"
        } else {
            "SELECT id, content_id, text, kind, span_start, span_end, source_label
             FROM entity_mentions ORDER BY id DESC LIMIT ?1"
        };

        let mut stmt = reader.prepare(sql)?;
        let rows = if let Some(kind) = kind {
            stmt.query_map(params![kind.to_string(), limit as i64], row_to_entity_mention)?
                .filter_map(|r| r.ok())
                .collect()
        } else {
            stmt.query_map(params![limit as i64], row_to_entity_mention)?
                .filter_map(|r| r.ok())
                .collect()
        };

        Ok(rows)
    }

    // ========================================================================
    // READ: C9 aggregations (entity graph)
    // ========================================================================

    /// Entities of `kind` (or all kinds), grouped by text, ranked by mention
    /// count, with up to three most recent content snippets retained.
    pub fn entities(&self, kind: Option<EntityKind>, limit: usize) -> Result<Vec<EntityAggregate>> {
        let reader = self
            .reader
            .lock()
            .map_err(|_| StorageError::Init("reader lock poisoned".into()))?;

        let sql = if kind.is_some() {
            "SELECT em.text, em.kind, COUNT(*) as mentions
             FROM entity_mentions em
             WHERE em.kind = ?1
             GROUP BY em.text, em.kind
             ORDER BY mentions DESC, em.text ASC
             LIMIT ?2"
        } else {
            "SELECT em.text, em.kind, COUNT(*) as mentions
             FROM entity_mentions em
             GROUP BY em.text, em.kind
             ORDER BY mentions DESC, em.text ASC
             LIMIT ?1"
        };

        let mut stmt = reader.prepare(sql)?;
        let grouped: Vec<(String, String, i64)> = if let Some(kind) = kind {
            stmt.query_map(params![kind.to_string(), limit as i64], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?))
            })?
            .filter_map(|r| r.ok())
            .collect()
        } else {
            stmt.query_map(params![limit as i64], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?))
            })?
            .filter_map(|r| r.ok())
            .collect()
        };
        drop(stmt);

        let mut aggregates = Vec::with_capacity(grouped.len());
        for (text, kind_str, mention_count) in grouped {
            let kind: EntityKind = kind_str.parse().unwrap_or(EntityKind::Other);

            let mut context_stmt = reader.prepare(
                "SELECT cr.text FROM entity_mentions em
                 JOIN content_records cr ON cr.id = em.content_id
                 WHERE em.text = ?1
                 ORDER BY cr.captured_at DESC
                 LIMIT 3",
            )?;
            let recent_contexts: Vec<String> = context_stmt
                .query_map(params![text], |row| row.get(0))?
                .filter_map(|r: std::result::Result<String, _>| r.ok())
                .collect();

            aggregates.push(EntityAggregate {
                text,
                kind,
                mention_count,
                recent_contexts,
            });
        }

        Ok(aggregates)
    }

    pub fn people(&self, limit: usize) -> Result<Vec<EntityAggregate>> {
        self.entities(Some(EntityKind::Person), limit)
    }

    pub fn organizations(&self, limit: usize) -> Result<Vec<EntityAggregate>> {
        self.entities(Some(EntityKind::Org), limit)
    }

    /// Entity co-occurrence graph: nodes ranked by mention count, truncated
    /// to the top `limit`; edges are co-mention counts between entities
    /// sharing a `ContentRecord`, with edges referencing dropped nodes
    /// removed.
    pub fn relationships(&self, limit: usize) -> Result<RelationshipGraph> {
        let top = self.entities(None, limit)?;
        let kept: std::collections::HashSet<String> = top.iter().map(|e| e.text.clone()).collect();

        let nodes: Vec<EntityNode> = top
            .iter()
            .map(|e| EntityNode {
                text: e.text.clone(),
                kind: e.kind,
                mention_count: e.mention_count,
            })
            .collect();

        let reader = self
            .reader
            .lock()
            .map_err(|_| StorageError::Init("reader lock poisoned".into()))?;

        let mut stmt = reader.prepare(
            "SELECT a.text, b.text
             FROM entity_mentions a
             JOIN entity_mentions b ON a.content_id = b.content_id AND a.text < b.text
             ",
        )?;
        let pairs: Vec<(String, String)> = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .filter_map(|r| r.ok())
            .collect();

        let mut weights: HashMap<(String, String), i64> = HashMap::new();
        for (a, b) in pairs {
            if kept.contains(&a) && kept.contains(&b) {
                *weights.entry((a, b)).or_insert(0) += 1;
            }
        }

        let mut edges: Vec<EntityEdge> = weights
            .into_iter()
            .map(|((source, target), weight)| EntityEdge {
                source,
                target,
                weight,
            })
            .collect();
        edges.sort_by(|a, b| b.weight.cmp(&a.weight));
        edges.truncate(limit);

        Ok(RelationshipGraph { nodes, edges })
    }

    // ========================================================================
    // Sync and retention
    // ========================================================================

    /// Re-scan source tables for rows that lack a matching `ContentRecord`
    /// and insert them, extracting entities with `extractor`. Idempotent:
    /// rows that already have a `ContentRecord` are skipped.
    pub fn sync_missing_content(&self, extractor: &dyn EntityExtractor) -> Result<usize> {
        let mut inserted = 0usize;

        let screen_rows: Vec<(i64, String, serde_json::Value)> = {
            let reader = self
                .reader
                .lock()
                .map_err(|_| StorageError::Init("reader lock poisoned".into()))?;
            let mut stmt = reader.prepare(
                "SELECT sc.id, sc.extracted_text, sc.metadata FROM screen_captures sc
                 WHERE sc.extracted_text != '' AND NOT EXISTS (
                     SELECT 1 FROM content_records cr WHERE cr.source = 'screen' AND cr.source_ref = sc.id
                 )",
            )?;
            stmt.query_map([], |row| {
                let metadata_str: String = row.get(2)?;
                let metadata: serde_json::Value =
                    serde_json::from_str(&metadata_str).unwrap_or(serde_json::json!({}));
                Ok((row.get(0)?, row.get(1)?, metadata))
            })?
            .filter_map(|r| r.ok())
            .collect()
        };
        for (id, text, metadata) in screen_rows {
            self.add_content(&text, SourceKind::Screen, Some(id), metadata, extractor)?;
            inserted += 1;
        }

        let clipboard_rows: Vec<(i64, String, serde_json::Value)> = {
            let reader = self
                .reader
                .lock()
                .map_err(|_| StorageError::Init("reader lock poisoned".into()))?;
            let mut stmt = reader.prepare(
                "SELECT ce.id, ce.text, ce.metadata FROM clipboard_entries ce
                 WHERE NOT EXISTS (
                     SELECT 1 FROM content_records cr WHERE cr.source = 'clipboard' AND cr.source_ref = ce.id
                 )",
            )?;
            stmt.query_map([], |row| {
                let metadata_str: String = row.get(2)?;
                let metadata: serde_json::Value =
                    serde_json::from_str(&metadata_str).unwrap_or(serde_json::json!({}));
                Ok((row.get(0)?, row.get(1)?, metadata))
            })?
            .filter_map(|r| r.ok())
            .collect()
        };
        for (id, text, metadata) in clipboard_rows {
            self.add_content(&text, SourceKind::Clipboard, Some(id), metadata, extractor)?;
            inserted += 1;
        }

        let file_rows: Vec<(i64, String, serde_json::Value)> = {
            let reader = self
                .reader
                .lock()
                .map_err(|_| StorageError::Init("reader lock poisoned".into()))?;
            let mut stmt = reader.prepare(
                "SELECT fe.id, fe.text, fe.metadata FROM file_events fe
                 WHERE fe.text IS NOT NULL AND fe.text != '' AND NOT EXISTS (
                     SELECT 1 FROM content_records cr WHERE cr.source = 'file' AND cr.source_ref = fe.id
                 )",
            )?;
            stmt.query_map([], |row| {
                let metadata_str: String = row.get(2)?;
                let metadata: serde_json::Value =
                    serde_json::from_str(&metadata_str).unwrap_or(serde_json::json!({}));
                Ok((row.get(0)?, row.get(1)?, metadata))
            })?
            .filter_map(|r| r.ok())
            .collect()
        };
        for (id, text, metadata) in file_rows {
            self.add_content(&text, SourceKind::File, Some(id), metadata, extractor)?;
            inserted += 1;
        }

        Ok(inserted)
    }

    /// Oldest-`captured_at`-first deletion of `ContentRecord` rows (cascading
    /// to `EntityMention`/`Embedding` via `ON DELETE CASCADE`, and to the
    /// vector index on a best-effort basis) until `COUNT(*) <= max_records`,
    /// then deletion of any remaining rows older than `max_age_days`. Source
    /// tables are never pruned here.
    pub fn apply_retention(
        &self,
        max_records: Option<u64>,
        max_age_days: Option<u64>,
    ) -> Result<usize> {
        let mut deleted = 0usize;
        let writer = self
            .writer
            .lock()
            .map_err(|_| StorageError::Init("writer lock poisoned".into()))?;

        if let Some(max_records) = max_records {
            let total: i64 = writer.query_row("SELECT COUNT(*) FROM content_records", [], |row| row.get(0))?;
            let overflow = total - max_records as i64;
            if overflow > 0 {
                let ids: Vec<i64> = {
                    let mut stmt = writer.prepare(
                        "SELECT id FROM content_records ORDER BY captured_at ASC, id ASC LIMIT ?1",
                    )?;
                    stmt.query_map(params![overflow], |row| row.get(0))?
                        .filter_map(|r| r.ok())
                        .collect()
                };
                for id in ids {
                    writer.execute("DELETE FROM content_records WHERE id = ?1", params![id])?;
                    deleted += 1;
                }
            }
        }

        if let Some(max_age_days) = max_age_days {
            let cutoff = Utc::now() - chrono::Duration::days(max_age_days as i64);
            let ids: Vec<i64> = {
                let mut stmt =
                    writer.prepare("SELECT id FROM content_records WHERE captured_at < ?1")?;
                stmt.query_map(params![cutoff.to_rfc3339()], |row| row.get(0))?
                    .filter_map(|r| r.ok())
                    .collect()
            };
            for id in ids {
                writer.execute("DELETE FROM content_records WHERE id = ?1", params![id])?;
                deleted += 1;
            }
        }

        drop(writer);

        #[cfg(feature = "vector-search")]
        if deleted > 0 {
            // Best-effort: rows already gone from the row store even if the
            // in-memory vector index still has stale keys until next load.
            tracing::debug!(deleted, "retention pass removed content records");
        }

        Ok(deleted)
    }

    pub fn stats(&self) -> Result<StoreStats> {
        let reader = self
            .reader
            .lock()
            .map_err(|_| StorageError::Init("reader lock poisoned".into()))?;

        let total_content: i64 =
            reader.query_row("SELECT COUNT(*) FROM content_records", [], |row| row.get(0))?;
        let total_entities: i64 =
            reader.query_row("SELECT COUNT(*) FROM entity_mentions", [], |row| row.get(0))?;

        let mut by_source = HashMap::new();
        let mut stmt = reader.prepare("SELECT source, COUNT(*) FROM content_records GROUP BY source")?;
        for row in stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))? {
            if let Ok((source, count)) = row {
                by_source.insert(source, count);
            }
        }
        drop(stmt);

        let mut by_entity_kind = HashMap::new();
        let mut stmt = reader.prepare("SELECT kind, COUNT(*) FROM entity_mentions GROUP BY kind")?;
        for row in stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))? {
            if let Ok((kind, count)) = row {
                by_entity_kind.insert(kind, count);
            }
        }
        drop(stmt);

        // Availability reflects whether the index is open and usable, not
        // whether it currently holds any vectors — an empty index still
        // degrades `semantic_search` gracefully, it just returns no hits.
        #[cfg(feature = "vector-search")]
        let vector_index_available = self.vector_index.lock().is_ok();
        #[cfg(not(feature = "vector-search"))]
        let vector_index_available = false;

        Ok(StoreStats {
            total_content,
            by_source,
            total_entities,
            by_entity_kind,
            vector_index_available,
            entity_extraction_available: true,
            embedder_available: cfg!(feature = "embeddings"),
        })
    }
}

// ============================================================================
// ROW MAPPERS
// ============================================================================

fn row_to_content_record(row: &rusqlite::Row) -> rusqlite::Result<ContentRecord> {
    let source_str: String = row.get(2)?;
    let captured_at_str: String = row.get(4)?;
    let metadata_str: String = row.get(5)?;

    Ok(ContentRecord {
        id: row.get(0)?,
        text: row.get(1)?,
        source: source_str.parse().unwrap_or(SourceKind::Manual),
        source_ref: row.get(3)?,
        captured_at: parse_timestamp(&captured_at_str),
        metadata: serde_json::from_str(&metadata_str).unwrap_or(serde_json::json!({})),
    })
}

fn row_to_search_hit(row: &rusqlite::Row) -> rusqlite::Result<SearchHit> {
    let record = row_to_content_record(row)?;
    let rank: f64 = row.get(6)?;
    Ok(SearchHit {
        record,
        score: rank as f32,
        match_type: MatchType::Lexical,
    })
}

fn row_to_entity_mention(row: &rusqlite::Row) -> rusqlite::Result<EntityMention> {
    let kind_str: String = row.get(3)?;
    Ok(EntityMention {
        id: row.get(0)?,
        content_id: row.get(1)?,
        text: row.get(2)?,
        kind: kind_str.parse().unwrap_or(EntityKind::Other),
        span_start: row.get::<_, i64>(4)? as usize,
        span_end: row.get::<_, i64>(5)? as usize,
        source_label: row.get(6)?,
    })
}

fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

#[allow(dead_code)]
fn screen_capture_from_row(row: &rusqlite::Row) -> rusqlite::Result<ScreenCapture> {
    let captured_at_str: String = row.get(1)?;
    let metadata_str: String = row.get(5)?;
    Ok(ScreenCapture {
        id: row.get(0)?,
        captured_at: parse_timestamp(&captured_at_str),
        perceptual_hash: row.get(2)?,
        extracted_text: row.get(3)?,
        active_window: row.get(4)?,
        active_app: row.get(5)?,
        metadata: serde_json::from_str(&metadata_str).unwrap_or(serde_json::json!({})),
    })
}

#[allow(dead_code)]
fn clipboard_entry_from_row(row: &rusqlite::Row) -> rusqlite::Result<ClipboardEntry> {
    let captured_at_str: String = row.get(1)?;
    let classified_type_str: String = row.get(4)?;
    let metadata_str: String = row.get(6)?;
    Ok(ClipboardEntry {
        id: row.get(0)?,
        captured_at: parse_timestamp(&captured_at_str),
        content_hash: row.get(2)?,
        text: row.get(3)?,
        classified_type: classified_type_str.parse().unwrap_or(ClipboardKind::Text),
        source_app: row.get(5)?,
        metadata: serde_json::from_str(&metadata_str).unwrap_or(serde_json::json!({})),
    })
}

#[allow(dead_code)]
fn file_event_from_row(row: &rusqlite::Row) -> rusqlite::Result<FileEvent> {
    let captured_at_str: String = row.get(1)?;
    let operation_str: String = row.get(4)?;
    let kind_str: String = row.get(7)?;
    let metadata_str: String = row.get(9)?;
    Ok(FileEvent {
        id: row.get(0)?,
        captured_at: parse_timestamp(&captured_at_str),
        file_path: row.get(2)?,
        file_name: row.get(3)?,
        operation: match operation_str.as_str() {
            "created" => FileOperation::Created,
            "deleted" => FileOperation::Deleted,
            _ => FileOperation::Modified,
        },
        content_hash: row.get(5)?,
        text: row.get(6)?,
        kind: kind_str.parse().unwrap_or(FileKind::Unknown),
        size_bytes: row.get(8)?,
        metadata: serde_json::from_str(&metadata_str).unwrap_or(serde_json::json!({})),
    })
}

#[allow(dead_code)]
fn file_version_from_row(row: &rusqlite::Row) -> rusqlite::Result<FileVersion> {
    let captured_at_str: String = row.get(4)?;
    Ok(FileVersion {
        id: row.get(0)?,
        file_path: row.get(1)?,
        version: row.get(2)?,
        content_hash: row.get(3)?,
        captured_at: parse_timestamp(&captured_at_str),
        size_bytes: row.get(5)?,
    })
}

impl std::str::FromStr for FileKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "text" => Ok(FileKind::Text),
            "code" => Ok(FileKind::Code),
            "pdf" => Ok(FileKind::Pdf),
            "document" => Ok(FileKind::Document),
            _ => Ok(FileKind::Unknown),
        }
    }
}

impl std::str::FromStr for ClipboardKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "text" => Ok(ClipboardKind::Text),
            "code" => Ok(ClipboardKind::Code),
            "url" => Ok(ClipboardKind::Url),
            "data" => Ok(ClipboardKind::Data),
            "email" => Ok(ClipboardKind::Email),
            "phone" => Ok(ClipboardKind::Phone),
            "path" => Ok(ClipboardKind::Path),
            _ => Ok(ClipboardKind::Text),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{HeuristicExtractor, NullExtractor};

    fn test_storage() -> Storage {
        let dir = tempfile::tempdir().unwrap();
        Storage::new(Some(dir.path().join("test.db"))).unwrap()
    }

    #[test]
    fn add_content_is_idempotent_per_source_ref() {
        let storage = test_storage();
        let extractor = NullExtractor;
        let id1 = storage
            .add_content("hello", SourceKind::Clipboard, Some(1), serde_json::json!({}), &extractor)
            .unwrap();
        let id2 = storage
            .add_content("hello again", SourceKind::Clipboard, Some(1), serde_json::json!({}), &extractor)
            .unwrap();
        assert_eq!(id1, id2);
    }

    #[test]
    fn lexical_search_finds_inserted_content() {
        let storage = test_storage();
        let extractor = NullExtractor;
        storage
            .add_content(
                "Python programming tutorial",
                SourceKind::Manual,
                None,
                serde_json::json!({}),
                &extractor,
            )
            .unwrap();
        storage
            .add_content("JavaScript guide", SourceKind::Manual, None, serde_json::json!({}), &extractor)
            .unwrap();

        let hits = storage.lexical_search("python tutorial", None, 5).unwrap();
        assert_eq!(hits.len(), 1);
        assert!(hits[0].record.text.contains("Python"));
    }

    #[test]
    fn screen_capture_dedup_rejects_consecutive_same_hash() {
        let storage = test_storage();
        let first = storage
            .add_screen_capture("abc123", "some text", "Editor", "VSCode", serde_json::json!({}))
            .unwrap();
        assert!(first.is_some());

        let second = storage
            .add_screen_capture("abc123", "some text", "Editor", "VSCode", serde_json::json!({}))
            .unwrap();
        assert!(second.is_none());

        let third = storage
            .add_screen_capture("def456", "different", "Editor", "VSCode", serde_json::json!({}))
            .unwrap();
        assert!(third.is_some());
    }

    #[test]
    fn clipboard_dedup_rejects_consecutive_same_hash() {
        let storage = test_storage();
        let first = storage
            .add_clipboard_entry("hash1", "hello", ClipboardKind::Text, "Terminal", serde_json::json!({}))
            .unwrap();
        assert!(first.is_some());
        let second = storage
            .add_clipboard_entry("hash1", "hello", ClipboardKind::Text, "Terminal", serde_json::json!({}))
            .unwrap();
        assert!(second.is_none());
    }

    #[test]
    fn file_version_chain_increments_on_modify() {
        let storage = test_storage();
        storage
            .add_file_event(
                "/tmp/notes.txt",
                "notes.txt",
                FileOperation::Created,
                Some("h1"),
                Some("v1"),
                FileKind::Text,
                Some(2),
                serde_json::json!({}),
            )
            .unwrap();
        storage
            .add_file_event(
                "/tmp/notes.txt",
                "notes.txt",
                FileOperation::Modified,
                Some("h2"),
                Some("v2"),
                FileKind::Text,
                Some(2),
                serde_json::json!({}),
            )
            .unwrap();
        storage
            .add_file_event(
                "/tmp/notes.txt",
                "notes.txt",
                FileOperation::Modified,
                Some("h3"),
                Some("v3"),
                FileKind::Text,
                Some(2),
                serde_json::json!({}),
            )
            .unwrap();

        let reader = storage.reader.lock().unwrap();
        let versions: Vec<i64> = reader
            .prepare("SELECT version FROM file_versions WHERE file_path = ?1 ORDER BY version ASC")
            .unwrap()
            .query_map(params!["/tmp/notes.txt"], |row| row.get(0))
            .unwrap()
            .filter_map(|r| r.ok())
            .collect();
        assert_eq!(versions, vec![1, 2]);
    }

    #[test]
    fn entity_mentions_respect_span_invariant() {
        let storage = test_storage();
        let extractor = HeuristicExtractor::new();
        let text = "Jane Doe met with Acme Corp in London.";
        storage
            .add_content(text, SourceKind::Manual, None, serde_json::json!({}), &extractor)
            .unwrap();

        let mentions = storage.list_entities(None, 100).unwrap();
        for mention in mentions {
            assert!(mention.span_start < mention.span_end);
            assert!(mention.span_end <= text.len());
        }
    }

    #[test]
    fn relationships_counts_co_mentions() {
        let storage = test_storage();
        let extractor = HeuristicExtractor::new();
        storage
            .add_content(
                "Alice works with Acme Corp.",
                SourceKind::Manual,
                None,
                serde_json::json!({}),
                &extractor,
            )
            .unwrap();
        storage
            .add_content(
                "Alice also met Acme Corp yesterday.",
                SourceKind::Manual,
                None,
                serde_json::json!({}),
                &extractor,
            )
            .unwrap();

        let graph = storage.relationships(10).unwrap();
        let edge = graph
            .edges
            .iter()
            .find(|e| (e.source == "Alice" && e.target == "Acme Corp") || (e.target == "Alice" && e.source == "Acme Corp"))
            .expect("Alice/Acme Corp co-mention edge");
        assert_eq!(edge.weight, 2);
    }

    #[test]
    fn timeline_returns_recent_records_only() {
        let storage = test_storage();
        let extractor = NullExtractor;
        storage
            .add_content("recent note", SourceKind::Manual, None, serde_json::json!({}), &extractor)
            .unwrap();

        let records = storage.timeline(7, None, 10).unwrap();
        assert_eq!(records.len(), 1);

        // `timeline`'s window is `[now - days, now]`; with `days = 0` the
        // cutoff is evaluated at query time, strictly after the row's
        // `captured_at`, so the just-inserted row falls outside the window.
        let records = storage.timeline(0, None, 10).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn sync_missing_content_backfills_from_source_tables() {
        let storage = test_storage();
        let extractor = NullExtractor;
        storage
            .add_clipboard_entry("h1", "orphaned clipboard text", ClipboardKind::Text, "Terminal", serde_json::json!({}))
            .unwrap();

        let inserted = storage.sync_missing_content(&extractor).unwrap();
        assert_eq!(inserted, 1);

        // Re-running is a no-op.
        let inserted_again = storage.sync_missing_content(&extractor).unwrap();
        assert_eq!(inserted_again, 0);
    }

    #[test]
    fn apply_retention_prunes_oldest_first_by_max_records() {
        let storage = test_storage();
        let extractor = NullExtractor;
        for i in 0..5 {
            storage
                .add_content(&format!("note {i}"), SourceKind::Manual, None, serde_json::json!({}), &extractor)
                .unwrap();
        }

        let deleted = storage.apply_retention(Some(3), None).unwrap();
        assert_eq!(deleted, 2);

        let total: i64 = storage
            .reader
            .lock()
            .unwrap()
            .query_row("SELECT COUNT(*) FROM content_records", [], |row| row.get(0))
            .unwrap();
        assert_eq!(total, 3);
    }
}
