//! Shared data model
//!
//! Types for the unified content store: `ContentRecord` and the rows it is
//! mirrored from (`ScreenCapture`, `ClipboardEntry`, `FileEvent`,
//! `FileVersion`), plus `EntityMention` and the embedding record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where a piece of captured content originated.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Screen,
    Clipboard,
    File,
    Manual,
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceKind::Screen => write!(f, "screen"),
            SourceKind::Clipboard => write!(f, "clipboard"),
            SourceKind::File => write!(f, "file"),
            SourceKind::Manual => write!(f, "manual"),
        }
    }
}

impl std::str::FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "screen" => Ok(SourceKind::Screen),
            "clipboard" => Ok(SourceKind::Clipboard),
            "file" => Ok(SourceKind::File),
            "manual" => Ok(SourceKind::Manual),
            _ => Err(format!("unknown source: {s}")),
        }
    }
}

/// Canonical named-entity kind. Source-specific labels (e.g. spaCy's
/// `PERSON`/`ORG`/`GPE`) are mapped down to this set; see
/// [`crate::entities::map_source_label`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Person,
    Org,
    Date,
    Money,
    Geopolitical,
    Product,
    Other,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityKind::Person => write!(f, "person"),
            EntityKind::Org => write!(f, "org"),
            EntityKind::Date => write!(f, "date"),
            EntityKind::Money => write!(f, "money"),
            EntityKind::Geopolitical => write!(f, "geopolitical"),
            EntityKind::Product => write!(f, "product"),
            EntityKind::Other => write!(f, "other"),
        }
    }
}

impl std::str::FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "person" => Ok(EntityKind::Person),
            "org" => Ok(EntityKind::Org),
            "date" => Ok(EntityKind::Date),
            "money" => Ok(EntityKind::Money),
            "geopolitical" => Ok(EntityKind::Geopolitical),
            "product" => Ok(EntityKind::Product),
            "other" => Ok(EntityKind::Other),
            _ => Err(format!("unknown entity kind: {s}")),
        }
    }
}

/// File system change kind, mirrors `watchdog`'s created/modified/deleted.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum FileOperation {
    Created,
    Modified,
    Deleted,
}

impl std::fmt::Display for FileOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileOperation::Created => write!(f, "created"),
            FileOperation::Modified => write!(f, "modified"),
            FileOperation::Deleted => write!(f, "deleted"),
        }
    }
}

/// Coarse file content classification, drives which extractor runs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Text,
    Code,
    Pdf,
    Document,
    Unknown,
}

impl std::fmt::Display for FileKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileKind::Text => write!(f, "text"),
            FileKind::Code => write!(f, "code"),
            FileKind::Pdf => write!(f, "pdf"),
            FileKind::Document => write!(f, "document"),
            FileKind::Unknown => write!(f, "unknown"),
        }
    }
}

/// Clipboard content classification (spec §4.6).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ClipboardKind {
    Text,
    Code,
    Url,
    Data,
    Email,
    Phone,
    Path,
}

impl std::fmt::Display for ClipboardKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClipboardKind::Text => write!(f, "text"),
            ClipboardKind::Code => write!(f, "code"),
            ClipboardKind::Url => write!(f, "url"),
            ClipboardKind::Data => write!(f, "data"),
            ClipboardKind::Email => write!(f, "email"),
            ClipboardKind::Phone => write!(f, "phone"),
            ClipboardKind::Path => write!(f, "path"),
        }
    }
}

/// Screen-grab scope (spec §4.5, `capture.screen_mode`).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum CaptureMode {
    #[default]
    Primary,
    All,
    Specific,
    Combined,
}

impl std::str::FromStr for CaptureMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "primary" => Ok(CaptureMode::Primary),
            "all" => Ok(CaptureMode::All),
            "specific" => Ok(CaptureMode::Specific),
            "combined" => Ok(CaptureMode::Combined),
            _ => Err(format!("unknown capture mode: {s}")),
        }
    }
}

/// A durable, unified content row. The join point for lexical search,
/// semantic search, and entity lookups.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentRecord {
    pub id: i64,
    pub text: String,
    pub source: SourceKind,
    /// Foreign id into the source-specific table (`ScreenCapture`,
    /// `ClipboardEntry`, `FileEvent`); `None` for manually-added content.
    pub source_ref: Option<i64>,
    pub captured_at: DateTime<Utc>,
    pub metadata: serde_json::Value,
}

/// A named-entity span extracted from a `ContentRecord`'s text.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityMention {
    pub id: i64,
    pub content_id: i64,
    pub text: String,
    pub kind: EntityKind,
    pub span_start: usize,
    pub span_end: usize,
    /// Original extractor-specific label before mapping to `kind`.
    pub source_label: Option<String>,
}

/// A dense vector attached 1:1 to a `ContentRecord`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbeddingRecord {
    pub content_id: i64,
    pub vector: Vec<f32>,
    pub truncated_text: String,
    pub captured_at: DateTime<Utc>,
    pub source: SourceKind,
}

/// Source row for screen captures (C5).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenCapture {
    pub id: i64,
    pub captured_at: DateTime<Utc>,
    pub perceptual_hash: String,
    pub extracted_text: String,
    pub active_window: String,
    pub active_app: String,
    pub metadata: serde_json::Value,
}

/// Source row for clipboard entries (C6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClipboardEntry {
    pub id: i64,
    pub captured_at: DateTime<Utc>,
    pub content_hash: String,
    pub text: String,
    pub classified_type: ClipboardKind,
    pub source_app: String,
    pub metadata: serde_json::Value,
}

/// Source row for filesystem events (C7).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEvent {
    pub id: i64,
    pub captured_at: DateTime<Utc>,
    pub file_path: String,
    pub file_name: String,
    pub operation: FileOperation,
    pub content_hash: Option<String>,
    pub text: Option<String>,
    pub kind: FileKind,
    pub size_bytes: Option<i64>,
    pub metadata: serde_json::Value,
}

/// One content-hash-addressed version of a watched file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileVersion {
    pub id: i64,
    pub file_path: String,
    pub version: i64,
    pub content_hash: String,
    pub captured_at: DateTime<Utc>,
    pub size_bytes: Option<i64>,
}

/// A lexical or semantic search hit: the record plus a ranking signal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    pub record: ContentRecord,
    /// BM25-derived rank for lexical hits, cosine distance for semantic
    /// hits (smaller is better for distance, so callers must check
    /// `match_type` to interpret `score`).
    pub score: f32,
    pub match_type: MatchType,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum MatchType {
    Lexical,
    Semantic,
}

/// Aggregated entity view used by `people()`/`organizations()`/`entities()`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityAggregate {
    pub text: String,
    pub kind: EntityKind,
    pub mention_count: i64,
    /// Up to three most recent content snippets mentioning this entity.
    pub recent_contexts: Vec<String>,
}

/// A node in the entity co-occurrence graph returned by `relationships()`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityNode {
    pub text: String,
    pub kind: EntityKind,
    pub mention_count: i64,
}

/// A co-mention edge between two entities that appear in the same
/// `ContentRecord`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityEdge {
    pub source: String,
    pub target: String,
    pub weight: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipGraph {
    pub nodes: Vec<EntityNode>,
    pub edges: Vec<EntityEdge>,
}

/// Summary counters returned by `Storage::stats()`.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct StoreStats {
    pub total_content: i64,
    pub by_source: std::collections::HashMap<String, i64>,
    pub total_entities: i64,
    pub by_entity_kind: std::collections::HashMap<String, i64>,
    pub vector_index_available: bool,
    pub entity_extraction_available: bool,
    pub embedder_available: bool,
}
