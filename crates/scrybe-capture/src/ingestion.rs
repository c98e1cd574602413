//! Ingestion Pipeline (spec §4.8, component C8).
//!
//! The single consumer of the `Observation` channel. For each observation:
//! privacy-filter the window/app (screen) or drop nothing (clipboard/file
//! have no window context), redact PII from any extracted text, persist the
//! source-specific row, mirror it into `content_records` (idempotent on
//! `(source, source_ref)`, which also runs entity extraction), and — when
//! the `embeddings` feature is enabled — write a local embedding for the
//! mirrored text.

use std::sync::Arc;

use scrybe_core::config::StorageConfig;
use scrybe_core::entities::EntityExtractor;
use scrybe_core::privacy::PrivacyFilter;
use scrybe_core::{SourceKind, Storage};

use crate::events::{ContentCapturedEvent, EventBus};
use crate::observation::{Observation, ObservationPayload, ObservationReceiver};

#[cfg(feature = "embeddings")]
use scrybe_core::embeddings::Embedder;

/// How many ingested observations pass between opportunistic retention
/// sweeps (SPEC_FULL.md §13.2: "run opportunistically after each ingestion
/// batch"). A fixed batch size avoids a `DELETE` round-trip per observation
/// while keeping the store close to its configured bound.
const RETENTION_BATCH_SIZE: u64 = 50;

struct RetentionPolicy {
    max_records: Option<u64>,
    max_age_days: Option<u64>,
    since_last_check: u64,
}

pub struct IngestionPipeline {
    storage: Arc<Storage>,
    privacy: Arc<PrivacyFilter>,
    extractor: Arc<dyn EntityExtractor>,
    #[cfg(feature = "embeddings")]
    embedder: Option<Arc<Embedder>>,
    events: Option<EventBus>,
    retention: Option<RetentionPolicy>,
}

impl IngestionPipeline {
    pub fn new(
        storage: Arc<Storage>,
        privacy: Arc<PrivacyFilter>,
        extractor: Arc<dyn EntityExtractor>,
        #[cfg(feature = "embeddings")] embedder: Option<Arc<Embedder>>,
    ) -> Self {
        Self {
            storage,
            privacy,
            extractor,
            #[cfg(feature = "embeddings")]
            embedder,
            events: None,
            retention: None,
        }
    }

    /// Attach an optional in-process event bus (spec §4.8 step 5): every
    /// successfully mirrored `ContentRecord` publishes a `content.captured`
    /// event after its commit. No bus is attached by default.
    pub fn with_event_bus(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    /// Enable opportunistic retention sweeps (SPEC_FULL.md §13.2) when
    /// `config.auto_cleanup` is set. No-op otherwise.
    pub fn with_retention(mut self, config: &StorageConfig) -> Self {
        if config.auto_cleanup {
            self.retention = Some(RetentionPolicy {
                max_records: config.max_records,
                max_age_days: config.max_age_days,
                since_last_check: 0,
            });
        }
        self
    }

    /// Drain observations until the channel is closed (every producer
    /// daemon has shut down). This is the pipeline's whole lifetime; there
    /// is no separate cancellation token because closing the channel is
    /// already the shutdown signal.
    pub async fn run(mut self, mut receiver: ObservationReceiver) {
        tracing::info!("ingestion pipeline starting");
        while let Some(observation) = receiver.recv().await {
            if let Err(e) = self.ingest(observation) {
                tracing::warn!(error = %e, "failed to ingest observation");
            }
            self.maybe_apply_retention();
        }
        tracing::info!("ingestion pipeline stopping, channel closed");
    }

    fn ingest(&mut self, observation: Observation) -> Result<(), scrybe_core::storage::StorageError> {
        match observation.payload {
            ObservationPayload::Screen(payload) => {
                if !self.privacy.should_capture(&payload.window, &payload.app) {
                    return Ok(());
                }
                let (redacted_text, pii_matches) = self.privacy.redact(&payload.text);
                let metadata = serde_json::json!({
                    "window": payload.window,
                    "app": payload.app,
                    "width": payload.width,
                    "height": payload.height,
                    "monitorIndex": payload.monitor_index,
                    "piiRedactions": pii_matches.len(),
                });

                let source_ref = self.storage.add_screen_capture(
                    &payload.perceptual_hash,
                    &redacted_text,
                    &payload.window,
                    &payload.app,
                    metadata.clone(),
                )?;

                if let Some(id) = source_ref {
                    if !redacted_text.is_empty() {
                        self.mirror_content(&redacted_text, SourceKind::Screen, id, metadata);
                    }
                }
            }
            ObservationPayload::Clipboard(payload) => {
                let (redacted_text, pii_matches) = self.privacy.redact(&payload.text);
                let metadata = serde_json::json!({
                    "sourceApp": payload.source_app,
                    "length": payload.length,
                    "lineCount": payload.line_count,
                    "piiRedactions": pii_matches.len(),
                });

                let source_ref = self.storage.add_clipboard_entry(
                    &payload.content_hash,
                    &redacted_text,
                    payload.classified_type,
                    &payload.source_app,
                    metadata.clone(),
                )?;

                if let Some(id) = source_ref {
                    if !redacted_text.is_empty() {
                        self.mirror_content(&redacted_text, SourceKind::Clipboard, id, metadata);
                    }
                }
            }
            ObservationPayload::File(payload) => {
                let redacted_text = payload.text.as_deref().map(|t| self.privacy.redact(t));
                let text_for_storage = redacted_text.as_ref().map(|(t, _)| t.as_str());
                let pii_count = redacted_text.as_ref().map(|(_, m)| m.len()).unwrap_or(0);

                let metadata = serde_json::json!({
                    "fileName": payload.file_name,
                    "extension": payload.extension,
                    "kind": payload.kind.to_string(),
                    "piiRedactions": pii_count,
                });

                let id = self.storage.add_file_event(
                    &payload.file_path,
                    &payload.file_name,
                    payload.operation,
                    payload.content_hash.as_deref(),
                    text_for_storage,
                    payload.kind,
                    payload.size_bytes.map(|b| b as i64),
                    metadata.clone(),
                )?;

                if let Some(text) = text_for_storage {
                    if !text.is_empty() {
                        self.mirror_content(text, SourceKind::File, id, metadata);
                    }
                }
            }
        }
        Ok(())
    }

    fn mirror_content(&mut self, text: &str, source: SourceKind, source_ref: i64, metadata: serde_json::Value) {
        match self
            .storage
            .add_content(text, source, Some(source_ref), metadata, self.extractor.as_ref())
        {
            Ok(content_id) => {
                self.write_embedding(content_id, text, source);
                if let Some(events) = &self.events {
                    events.publish(ContentCapturedEvent {
                        content_id,
                        source,
                        captured_at: chrono::Utc::now(),
                    });
                }
            }
            Err(e) => tracing::warn!(error = %e, "failed to mirror content record"),
        }
    }

    #[cfg(feature = "embeddings")]
    fn write_embedding(&mut self, content_id: i64, text: &str, source: SourceKind) {
        let Some(embedder) = &self.embedder else {
            return;
        };
        if let Err(e) = self.storage.add_embedding(content_id, text, source, embedder) {
            tracing::warn!(error = %e, "failed to write embedding");
        }
    }

    #[cfg(not(feature = "embeddings"))]
    fn write_embedding(&mut self, _content_id: i64, _text: &str, _source: SourceKind) {}

    /// Backfill `content_records` for any source rows that predate a crash
    /// or a restart between writing the source table and mirroring it.
    pub fn sync_missing(&self) -> Result<usize, scrybe_core::storage::StorageError> {
        self.storage.sync_missing_content(self.extractor.as_ref())
    }

    fn maybe_apply_retention(&mut self) {
        let Some(policy) = &mut self.retention else { return };
        policy.since_last_check += 1;
        if policy.since_last_check < RETENTION_BATCH_SIZE {
            return;
        }
        policy.since_last_check = 0;

        match self.storage.apply_retention(policy.max_records, policy.max_age_days) {
            Ok(0) => {}
            Ok(deleted) => tracing::info!(deleted, "retention sweep pruned content records"),
            Err(e) => tracing::warn!(error = %e, "retention sweep failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scrybe_core::entities::NullExtractor;
    use scrybe_core::privacy::PrivacyConfig;
    use scrybe_core::ClipboardKind;

    fn pipeline() -> (IngestionPipeline, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("capture.db");
        let storage = Arc::new(Storage::new(Some(db_path)).unwrap());
        let privacy = Arc::new(PrivacyFilter::new(PrivacyConfig::default()));
        let extractor: Arc<dyn EntityExtractor> = Arc::new(NullExtractor);
        let pipeline = IngestionPipeline::new(
            storage,
            privacy,
            extractor,
            #[cfg(feature = "embeddings")]
            None,
        );
        (pipeline, dir)
    }

    #[test]
    fn ingests_clipboard_observation_into_content_records() {
        let (mut pipeline, _dir) = pipeline();
        let payload = crate::observation::ClipboardPayload {
            text: "hello world".to_string(),
            content_hash: "abc123".to_string(),
            classified_type: ClipboardKind::Text,
            source_app: "Terminal".to_string(),
            length: 11,
            line_count: 1,
        };
        let observation = Observation::clipboard(chrono::Utc::now(), payload);
        pipeline.ingest(observation).unwrap();

        let stats = pipeline.storage.stats().unwrap();
        assert_eq!(stats.total_content, 1);
    }

    #[test]
    fn skips_screen_observation_from_excluded_app() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("capture.db");
        let storage = Arc::new(Storage::new(Some(db_path)).unwrap());
        let privacy = Arc::new(PrivacyFilter::new(PrivacyConfig {
            excluded_apps: vec!["1Password".to_string()],
            ..PrivacyConfig::default()
        }));
        let extractor: Arc<dyn EntityExtractor> = Arc::new(NullExtractor);
        let mut pipeline = IngestionPipeline::new(
            storage,
            privacy,
            extractor,
            #[cfg(feature = "embeddings")]
            None,
        );

        let payload = crate::observation::ScreenPayload {
            text: "secret vault contents".to_string(),
            perceptual_hash: "hash1".to_string(),
            window: "Vault".to_string(),
            app: "1Password".to_string(),
            width: 100,
            height: 100,
            monitor_index: 1,
        };
        let observation = Observation::screen(chrono::Utc::now(), payload);
        pipeline.ingest(observation).unwrap();

        let stats = pipeline.storage.stats().unwrap();
        assert_eq!(stats.total_content, 0);
    }
}
