//! The transient `Observation` record (spec §3) and the in-process channel
//! the three capture daemons (C5-C7) use to hand observations to the
//! ingestion pipeline (C8).
//!
//! An `Observation` is never persisted as-is: C8 consumes it exactly once,
//! writes the appropriate source row, and mirrors the text into a
//! `ContentRecord`. See `crate::ingestion`.

use chrono::{DateTime, Utc};
use scrybe_core::{ClipboardKind, FileKind, FileOperation};

/// Default bounded channel capacity (spec §5 Backpressure).
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Screen-capture payload: one monitor's grabbed-and-OCR'd frame.
#[derive(Debug, Clone)]
pub struct ScreenPayload {
    pub text: String,
    pub perceptual_hash: String,
    pub window: String,
    pub app: String,
    pub width: u32,
    pub height: u32,
    pub monitor_index: u32,
}

/// Clipboard-capture payload: one classified clipboard transition.
#[derive(Debug, Clone)]
pub struct ClipboardPayload {
    pub text: String,
    pub content_hash: String,
    pub classified_type: ClipboardKind,
    pub source_app: String,
    pub length: usize,
    pub line_count: usize,
}

/// Filesystem-capture payload: one create/modify/delete event.
#[derive(Debug, Clone)]
pub struct FilePayload {
    pub file_path: String,
    pub file_name: String,
    pub operation: FileOperation,
    pub content_hash: Option<String>,
    pub text: Option<String>,
    pub kind: FileKind,
    pub size_bytes: Option<u64>,
    pub extension: Option<String>,
}

/// A single capture-daemon payload, tagged by source (spec §3 Observation).
#[derive(Debug, Clone)]
pub enum ObservationPayload {
    Screen(ScreenPayload),
    Clipboard(ClipboardPayload),
    File(FilePayload),
}

/// A transient observation handed from a capture daemon to the ingestion
/// pipeline. Produced by C5-C7, consumed exactly once by C8, never
/// persisted in this shape.
#[derive(Debug, Clone)]
pub struct Observation {
    pub captured_at: DateTime<Utc>,
    pub payload: ObservationPayload,
}

impl Observation {
    pub fn screen(captured_at: DateTime<Utc>, payload: ScreenPayload) -> Self {
        Self {
            captured_at,
            payload: ObservationPayload::Screen(payload),
        }
    }

    pub fn clipboard(captured_at: DateTime<Utc>, payload: ClipboardPayload) -> Self {
        Self {
            captured_at,
            payload: ObservationPayload::Clipboard(payload),
        }
    }

    pub fn file(captured_at: DateTime<Utc>, payload: FilePayload) -> Self {
        Self {
            captured_at,
            payload: ObservationPayload::File(payload),
        }
    }
}

/// The ingestion channel: capture daemons hold the `Sender`, the ingestion
/// pipeline task holds the `Receiver`. A bounded `tokio::sync::mpsc` channel
/// gives backpressure for free — `send` suspends the caller when the
/// channel is full, which is the spec's required behavior for clipboard
/// and filesystem observations (screen capture is exempted, see
/// `ScreenSender`).
pub type ObservationSender = tokio::sync::mpsc::Sender<Observation>;
pub type ObservationReceiver = tokio::sync::mpsc::Receiver<Observation>;

pub fn observation_channel(capacity: usize) -> (ObservationSender, ObservationReceiver) {
    tokio::sync::mpsc::channel(capacity)
}

/// Thin wrapper around `ObservationSender` that drops-and-logs instead of
/// blocking when the channel is full (spec §5: "the screen daemon is
/// exempted: if the channel is full it drops the current frame and logs a
/// warning, since screen captures are expected to be lossy").
pub struct LossySender {
    inner: ObservationSender,
}

impl LossySender {
    pub fn new(inner: ObservationSender) -> Self {
        Self { inner }
    }

    /// Attempt a non-blocking send; drop and log on a full channel.
    pub fn try_send_or_drop(&self, observation: Observation) {
        if let Err(tokio::sync::mpsc::error::TrySendError::Full(_)) = self.inner.try_send(observation) {
            tracing::warn!("ingestion channel full, dropping screen capture frame");
        }
    }
}
