//! Filesystem Watcher (spec §4.7, component C7).
//!
//! Watches the configured directories recursively, debounces `notify`
//! events per path, filters by ignore pattern / extension / size, and
//! emits an `Observation` per create/modify/delete that survives the
//! filter. Version numbering for modified files is the ingestion
//! pipeline's concern (`Storage::add_file_event` handles it), not this
//! daemon's.

pub mod extract;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::mpsc as std_mpsc;
use std::time::{Duration, Instant};

use notify::{RecursiveMode, Watcher};
use scrybe_core::config::CaptureConfig;
use scrybe_core::FileOperation;
use sha2::{Digest, Sha256};
use tokio_util::sync::CancellationToken;

use crate::observation::{FilePayload, Observation, ObservationSender};

/// Directory name fragments that are never watched, mirroring the
/// original capture daemon's fixed ignore set.
const IGNORE_PATTERNS: &[&str] = &[
    "node_modules",
    ".git",
    ".venv",
    "venv",
    "__pycache__",
    ".idea",
    ".vscode",
    "dist",
    "build",
    ".DS_Store",
];

const DEBOUNCE: Duration = Duration::from_millis(500);
const POLL_INTERVAL: Duration = Duration::from_millis(200);

pub struct FilesystemDaemon {
    sender: ObservationSender,
    watch_directories: Vec<PathBuf>,
    max_file_size: u64,
    extensions: Vec<String>,
}

impl FilesystemDaemon {
    pub fn new(sender: ObservationSender, config: &CaptureConfig) -> Self {
        Self {
            sender,
            watch_directories: config.watch_directories.clone(),
            max_file_size: config.file_max_size,
            extensions: config.file_extensions.clone(),
        }
    }

    pub async fn run(self, shutdown: CancellationToken) {
        tracing::info!(dirs = ?self.watch_directories, "filesystem watcher starting");

        let (tx, rx) = std_mpsc::channel();
        let mut watcher = match notify::recommended_watcher(tx) {
            Ok(w) => w,
            Err(e) => {
                tracing::error!(error = %e, "failed to create filesystem watcher");
                return;
            }
        };

        for dir in &self.watch_directories {
            if !dir.is_dir() {
                continue;
            }
            if let Err(e) = watcher.watch(dir, RecursiveMode::Recursive) {
                tracing::warn!(path = %dir.display(), error = %e, "failed to watch directory");
            }
        }

        let mut pending: HashMap<PathBuf, PendingEvent> = HashMap::new();

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("filesystem watcher stopping");
                    return;
                }
                _ = tokio::time::sleep(POLL_INTERVAL) => {}
            }

            while let Ok(result) = rx.try_recv() {
                if let Ok(event) = result {
                    self.absorb_event(event, &mut pending);
                }
            }

            let now = Instant::now();
            let mut ready = Vec::new();
            pending.retain(|path, pe| {
                if now.duration_since(pe.last_seen) >= DEBOUNCE {
                    ready.push((path.clone(), pe.kind));
                    false
                } else {
                    true
                }
            });

            for (path, kind) in ready {
                if let Some(payload) = self.build_payload(&path, kind) {
                    if self
                        .sender
                        .send(Observation::file(chrono::Utc::now(), payload))
                        .await
                        .is_err()
                    {
                        tracing::info!("ingestion channel closed, filesystem watcher stopping");
                        return;
                    }
                }
            }
        }
    }

    fn absorb_event(&self, event: notify::Event, pending: &mut HashMap<PathBuf, PendingEvent>) {
        let kind = match event.kind {
            notify::EventKind::Create(_) => FileOperation::Created,
            notify::EventKind::Modify(_) => FileOperation::Modified,
            notify::EventKind::Remove(_) => FileOperation::Deleted,
            _ => return,
        };

        let now = Instant::now();
        for path in event.paths {
            if should_ignore(&path) {
                continue;
            }
            match pending.get_mut(&path) {
                Some(existing) => {
                    existing.kind = merge_event_kinds(existing.kind, kind);
                    existing.last_seen = now;
                }
                None => {
                    pending.insert(path, PendingEvent { kind, last_seen: now });
                }
            }
        }
    }

    fn build_payload(&self, path: &Path, operation: FileOperation) -> Option<FilePayload> {
        if should_ignore(path) {
            return None;
        }

        let file_name = path.file_name()?.to_string_lossy().to_string();
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{}", e.to_lowercase()));

        if operation != FileOperation::Deleted {
            if !is_supported_extension(&extension, &self.extensions) {
                return None;
            }
            let metadata = std::fs::metadata(path).ok()?;
            if !metadata.is_file() {
                return None;
            }
            if metadata.len() > self.max_file_size {
                return None;
            }

            let kind = extract::classify(path);
            let text = extract::extract_text(path, kind);
            let content_hash = content_hash(&text);

            return Some(FilePayload {
                file_path: path.to_string_lossy().to_string(),
                file_name,
                operation,
                content_hash: Some(content_hash),
                text: Some(text),
                kind,
                size_bytes: Some(metadata.len()),
                extension,
            });
        }

        // Deleted: the file is already gone so there is nothing to hash or
        // extract, but the event still carries path metadata through to
        // ingestion as long as the extension was one we track.
        if !is_supported_extension(&extension, &self.extensions) {
            return None;
        }
        let kind = extract::classify(path);
        Some(FilePayload {
            file_path: path.to_string_lossy().to_string(),
            file_name,
            operation,
            content_hash: None,
            text: None,
            kind,
            size_bytes: None,
            extension,
        })
    }
}

struct PendingEvent {
    kind: FileOperation,
    last_seen: Instant,
}

fn merge_event_kinds(old: FileOperation, new: FileOperation) -> FileOperation {
    match (old, new) {
        (FileOperation::Created, FileOperation::Deleted) => FileOperation::Deleted,
        (FileOperation::Created, FileOperation::Modified) => FileOperation::Created,
        (FileOperation::Deleted, FileOperation::Created) => FileOperation::Modified,
        (_, new) => new,
    }
}

fn should_ignore(path: &Path) -> bool {
    path.components().any(|c| {
        c.as_os_str()
            .to_str()
            .is_some_and(|s| IGNORE_PATTERNS.contains(&s))
    })
}

fn is_supported_extension(extension: &Option<String>, allowed: &[String]) -> bool {
    match extension {
        Some(ext) => allowed.iter().any(|a| a.eq_ignore_ascii_case(ext)),
        None => false,
    }
}

fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ignores_vendored_directories() {
        assert!(should_ignore(Path::new(
            "/home/bob/project/node_modules/pkg/index.js"
        )));
        assert!(should_ignore(Path::new("/home/bob/project/.git/HEAD")));
        assert!(!should_ignore(Path::new("/home/bob/Documents/notes.md")));
    }

    #[test]
    fn merges_create_then_delete_to_delete() {
        assert_eq!(
            merge_event_kinds(FileOperation::Created, FileOperation::Deleted),
            FileOperation::Deleted
        );
    }

    #[test]
    fn merges_delete_then_create_to_modified() {
        assert_eq!(
            merge_event_kinds(FileOperation::Deleted, FileOperation::Created),
            FileOperation::Modified
        );
    }

    #[test]
    fn extension_filter_is_case_insensitive() {
        let allowed = vec![".md".to_string(), ".rs".to_string()];
        assert!(is_supported_extension(&Some(".MD".to_string()), &allowed));
        assert!(!is_supported_extension(&Some(".exe".to_string()), &allowed));
        assert!(!is_supported_extension(&None, &allowed));
    }
}
