//! Clipboard Monitor (spec §4.6, component C6).
//!
//! Polls the OS clipboard, drops unchanged/empty content by SHA-256 hash,
//! truncates oversized text, classifies it with a deterministic heuristic,
//! and emits an `Observation`.

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use scrybe_core::config::CaptureConfig;
use scrybe_core::ClipboardKind;
use sha2::{Digest, Sha256};
use tokio_util::sync::CancellationToken;

use crate::observation::{ClipboardPayload, Observation, ObservationSender};

const TRUNCATION_MARKER: &str = "... [truncated]";

pub struct ClipboardDaemon {
    sender: ObservationSender,
    poll_interval: Duration,
    max_size: usize,
    last_hash: Option<String>,
}

impl ClipboardDaemon {
    pub fn new(sender: ObservationSender, config: &CaptureConfig) -> Self {
        Self {
            sender,
            poll_interval: Duration::from_secs_f64(config.clipboard_poll_interval.max(0.05)),
            max_size: config.clipboard_max_size as usize,
            last_hash: None,
        }
    }

    pub async fn run(mut self, shutdown: CancellationToken) {
        tracing::info!(interval = ?self.poll_interval, "clipboard monitor starting");

        let mut clipboard = match arboard::Clipboard::new() {
            Ok(c) => c,
            Err(e) => {
                tracing::error!(error = %e, "clipboard unavailable, monitor exiting");
                return;
            }
        };

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("clipboard monitor stopping");
                    return;
                }
                _ = tokio::time::sleep(self.poll_interval) => {}
            }

            let text = match clipboard.get_text() {
                Ok(text) => text,
                Err(_) => continue,
            };
            if text.is_empty() {
                continue;
            }

            let (text, _was_truncated) = truncate(text, self.max_size);

            let content_hash = content_hash(&text);
            if self.last_hash.as_deref() == Some(content_hash.as_str()) {
                continue;
            }
            self.last_hash = Some(content_hash.clone());

            let classified_type = classify(&text);
            let source_app = source_app();
            let line_count = text.lines().count();
            let length = text.chars().count();

            let payload = ClipboardPayload {
                text,
                content_hash,
                classified_type,
                source_app,
                length,
                line_count,
            };

            if self
                .sender
                .send(Observation::clipboard(chrono::Utc::now(), payload))
                .await
                .is_err()
            {
                tracing::info!("ingestion channel closed, clipboard monitor stopping");
                return;
            }
        }
    }
}

fn truncate(text: String, max_size: usize) -> (String, bool) {
    if text.len() <= max_size {
        return (text, false);
    }
    let mut cut = max_size.min(text.len());
    while cut > 0 && !text.is_char_boundary(cut) {
        cut -= 1;
    }
    let mut truncated = text[..cut].to_string();
    truncated.push_str(TRUNCATION_MARKER);
    (truncated, true)
}

fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

static URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(https?://\S+|www\.\S+)$").unwrap());
static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").unwrap());
static PHONE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\+?[\d\s\-()]{10,}$").unwrap());
static PATH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(/|[A-Za-z]:\\|~/)").unwrap());

static CODE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"\bdef\s+\w+\s*\(",
        r"\bfunction\s+\w+\s*\(",
        r"\bclass\s+\w+",
        r"\bimport\s+\w+",
        r"\bfrom\s+\w+\s+import",
        r"\bconst\s+\w+\s*=",
        r"\blet\s+\w+\s*=",
        r"\bvar\s+\w+\s*=",
        r"=>",
        r"(?s)\{.*\}",
        r"[{}\[\];]",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

/// Classify clipboard text. Order matches the original capture daemon
/// exactly: url -> email -> phone -> path -> structured data -> code -> text.
fn classify(content: &str) -> ClipboardKind {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return ClipboardKind::Text;
    }

    if URL_RE.is_match(&trimmed.to_lowercase()) {
        return ClipboardKind::Url;
    }
    if EMAIL_RE.is_match(trimmed) {
        return ClipboardKind::Email;
    }
    if PHONE_RE.is_match(trimmed) {
        return ClipboardKind::Phone;
    }
    if PATH_RE.is_match(trimmed) && (trimmed.contains('/') || trimmed.contains('\\')) {
        return ClipboardKind::Path;
    }

    if trimmed.starts_with(['{', '[', '<']) {
        if serde_json::from_str::<serde_json::Value>(content).is_ok() {
            return ClipboardKind::Data;
        }
        if trimmed.starts_with('<') {
            return ClipboardKind::Data;
        }
    }

    if content.contains(',') && content.contains('\n') {
        let lines: Vec<&str> = trimmed.lines().collect();
        if lines.len() > 1 {
            let counts: Vec<usize> = lines.iter().take(5).map(|l| l.matches(',').count()).collect();
            if let Some(&first) = counts.first() {
                if first > 0 && counts.iter().all(|&c| c == first) {
                    return ClipboardKind::Data;
                }
            }
        }
    }

    let lines: Vec<&str> = content.split('\n').collect();
    if lines.len() > 2 {
        let indented = lines
            .iter()
            .filter(|line| line.starts_with(' ') || line.starts_with('\t'))
            .count();
        if indented as f64 > lines.len() as f64 * 0.3 {
            return ClipboardKind::Code;
        }
    }

    if CODE_PATTERNS.iter().any(|re| re.is_match(content)) {
        return ClipboardKind::Code;
    }

    ClipboardKind::Text
}

/// Best-effort foreground app lookup, reusing the same platform probes as
/// the screen capturer's active-window resolution.
fn source_app() -> String {
    let (_, app) = crate::active_window::active_window();
    app
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_url() {
        assert_eq!(classify("https://example.com/path"), ClipboardKind::Url);
        assert_eq!(classify("www.example.com"), ClipboardKind::Url);
    }

    #[test]
    fn classifies_email() {
        assert_eq!(classify("someone@example.com"), ClipboardKind::Email);
    }

    #[test]
    fn classifies_phone() {
        assert_eq!(classify("+1 (555) 123-4567"), ClipboardKind::Phone);
    }

    #[test]
    fn classifies_path() {
        assert_eq!(classify("/usr/local/bin/foo"), ClipboardKind::Path);
        assert_eq!(classify("C:\\Users\\bob\\file.txt"), ClipboardKind::Path);
    }

    #[test]
    fn classifies_json_data() {
        assert_eq!(classify(r#"{"a": 1, "b": 2}"#), ClipboardKind::Data);
    }

    #[test]
    fn classifies_csv_data() {
        let csv = "a,b,c\n1,2,3\n4,5,6";
        assert_eq!(classify(csv), ClipboardKind::Data);
    }

    #[test]
    fn classifies_indented_code() {
        let code = "def foo():\n    return 1\n    # comment\n    pass";
        assert_eq!(classify(code), ClipboardKind::Code);
    }

    #[test]
    fn classifies_code_by_pattern() {
        assert_eq!(classify("const x = () => 1"), ClipboardKind::Code);
    }

    #[test]
    fn defaults_to_text() {
        assert_eq!(classify("just a sentence with no markers"), ClipboardKind::Text);
    }

    #[test]
    fn truncates_oversized_text() {
        let long = "a".repeat(100);
        let (truncated, was_truncated) = truncate(long, 10);
        assert!(was_truncated);
        assert!(truncated.ends_with(TRUNCATION_MARKER));
    }
}
