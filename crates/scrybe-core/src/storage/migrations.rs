//! Database Migrations
//!
//! Schema migration definitions for the storage layer.

/// Migration definitions
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "Initial schema: content records, entities, embeddings",
        up: MIGRATION_V1_UP,
    },
    Migration {
        version: 2,
        description: "Source tables: screen captures, clipboard entries, file events/versions",
        up: MIGRATION_V2_UP,
    },
    Migration {
        version: 3,
        description: "Performance: page_size 8192, FTS5 porter tokenizer",
        up: MIGRATION_V3_UP,
    },
];

/// A database migration
#[derive(Debug, Clone)]
pub struct Migration {
    /// Version number
    pub version: u32,
    /// Description
    pub description: &'static str,
    /// SQL to apply
    pub up: &'static str,
}

/// Apply every migration whose version is greater than the connection's
/// current `schema_version`, in order, each in its own transaction.
pub fn apply_migrations(conn: &rusqlite::Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
             version INTEGER PRIMARY KEY,
             applied_at TEXT NOT NULL
         );",
    )?;

    let current_version: u32 = conn
        .query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |row| {
            row.get(0)
        })
        .unwrap_or(0);

    for migration in MIGRATIONS {
        if migration.version > current_version {
            tracing::info!(version = migration.version, description = migration.description, "applying migration");
            conn.execute_batch(migration.up)?;
        }
    }

    Ok(())
}

/// V1: unified content store, entity mentions, embeddings
const MIGRATION_V1_UP: &str = r#"
CREATE TABLE IF NOT EXISTS content_records (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    text TEXT NOT NULL,
    source TEXT NOT NULL,           -- 'screen' | 'clipboard' | 'file' | 'manual'
    source_ref INTEGER,             -- rowid into the matching source table, NULL for manual
    captured_at TEXT NOT NULL,
    metadata TEXT NOT NULL DEFAULT '{}'
);

CREATE INDEX IF NOT EXISTS idx_content_source ON content_records(source, source_ref);
CREATE INDEX IF NOT EXISTS idx_content_captured_at ON content_records(captured_at);

-- FTS5 virtual table for full-text search over content_records
CREATE VIRTUAL TABLE IF NOT EXISTS content_fts USING fts5(
    text,
    content='content_records',
    content_rowid='id',
    tokenize='porter unicode61'
);

CREATE TRIGGER IF NOT EXISTS content_ai AFTER INSERT ON content_records BEGIN
    INSERT INTO content_fts(rowid, text) VALUES (NEW.id, NEW.text);
END;

CREATE TRIGGER IF NOT EXISTS content_ad AFTER DELETE ON content_records BEGIN
    INSERT INTO content_fts(content_fts, rowid, text) VALUES ('delete', OLD.id, OLD.text);
END;

CREATE TRIGGER IF NOT EXISTS content_au AFTER UPDATE ON content_records BEGIN
    INSERT INTO content_fts(content_fts, rowid, text) VALUES ('delete', OLD.id, OLD.text);
    INSERT INTO content_fts(rowid, text) VALUES (NEW.id, NEW.text);
END;

CREATE TABLE IF NOT EXISTS entity_mentions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    content_id INTEGER NOT NULL REFERENCES content_records(id) ON DELETE CASCADE,
    text TEXT NOT NULL,
    kind TEXT NOT NULL,             -- person | org | date | money | geopolitical | product | other
    span_start INTEGER NOT NULL,
    span_end INTEGER NOT NULL,
    source_label TEXT
);

CREATE INDEX IF NOT EXISTS idx_entities_content ON entity_mentions(content_id);
CREATE INDEX IF NOT EXISTS idx_entities_text ON entity_mentions(text);
CREATE INDEX IF NOT EXISTS idx_entities_kind ON entity_mentions(kind);

CREATE TABLE IF NOT EXISTS embeddings (
    content_id INTEGER PRIMARY KEY REFERENCES content_records(id) ON DELETE CASCADE,
    vector BLOB NOT NULL,
    dimensions INTEGER NOT NULL DEFAULT 384,
    model TEXT NOT NULL DEFAULT 'sentence-transformers/all-MiniLM-L6-v2',
    truncated_text TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL
);

INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (1, datetime('now'));
"#;

/// V2: source tables for each capture channel
const MIGRATION_V2_UP: &str = r#"
CREATE TABLE IF NOT EXISTS screen_captures (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    captured_at TEXT NOT NULL,
    perceptual_hash TEXT NOT NULL,
    extracted_text TEXT NOT NULL DEFAULT '',
    active_window TEXT NOT NULL DEFAULT '',
    active_app TEXT NOT NULL DEFAULT '',
    metadata TEXT NOT NULL DEFAULT '{}'
);

CREATE INDEX IF NOT EXISTS idx_screen_captured_at ON screen_captures(captured_at);

CREATE TABLE IF NOT EXISTS clipboard_entries (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    captured_at TEXT NOT NULL,
    content_hash TEXT NOT NULL,
    text TEXT NOT NULL,
    classified_type TEXT NOT NULL DEFAULT 'text',
    source_app TEXT NOT NULL DEFAULT '',
    metadata TEXT NOT NULL DEFAULT '{}'
);

CREATE INDEX IF NOT EXISTS idx_clipboard_captured_at ON clipboard_entries(captured_at);
CREATE INDEX IF NOT EXISTS idx_clipboard_hash ON clipboard_entries(content_hash);

CREATE TABLE IF NOT EXISTS file_events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    captured_at TEXT NOT NULL,
    file_path TEXT NOT NULL,
    file_name TEXT NOT NULL,
    operation TEXT NOT NULL,        -- created | modified | deleted
    content_hash TEXT,
    text TEXT,
    kind TEXT NOT NULL DEFAULT 'unknown',
    size_bytes INTEGER,
    metadata TEXT NOT NULL DEFAULT '{}'
);

CREATE INDEX IF NOT EXISTS idx_file_events_path ON file_events(file_path);
CREATE INDEX IF NOT EXISTS idx_file_events_captured_at ON file_events(captured_at);

CREATE TABLE IF NOT EXISTS file_versions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    file_path TEXT NOT NULL,
    version INTEGER NOT NULL,
    content_hash TEXT NOT NULL,
    captured_at TEXT NOT NULL,
    size_bytes INTEGER
);

CREATE INDEX IF NOT EXISTS idx_file_versions_path ON file_versions(file_path, version);

UPDATE schema_version SET version = 2, applied_at = datetime('now');
INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (2, datetime('now'));
"#;

/// V3: larger page size for fewer B-tree splits on bulk capture inserts,
/// porter+unicode61 tokenizer already applied at table creation in V1 for
/// fresh databases; this migration exists for databases created before the
/// tokenizer choice was finalized.
const MIGRATION_V3_UP: &str = r#"
PRAGMA page_size = 8192;

INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (3, datetime('now'));
"#;
