//! In-process content-captured event bus (spec §4.8 step 5).
//!
//! Downstream consumers outside this crate's scope (a UI layer, the
//! excluded action/automation executor) can subscribe to `content.captured`
//! events without the ingestion pipeline depending on them. Grounded on
//! `original_source/src/action/event_bus.py`'s publish/subscribe shape, but
//! replaced with an explicit handle per DESIGN.md's "no global singletons"
//! note — construct one and pass clones to whatever needs it, rather than
//! a process-wide instance every component reaches for implicitly.

use chrono::{DateTime, Utc};
use scrybe_core::SourceKind;

/// Published once per `ContentRecord` mirrored by the ingestion pipeline.
#[derive(Debug, Clone)]
pub struct ContentCapturedEvent {
    pub content_id: i64,
    pub source: SourceKind,
    pub captured_at: DateTime<Utc>,
}

/// A thin wrapper over a broadcast channel. Cloning an `EventBus` clones the
/// sender handle, not the channel itself — all clones publish to the same
/// set of subscribers.
#[derive(Clone)]
pub struct EventBus {
    sender: tokio::sync::broadcast::Sender<ContentCapturedEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = tokio::sync::broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<ContentCapturedEvent> {
        self.sender.subscribe()
    }

    /// Publish a `content.captured` event. A publish with no subscribers is
    /// a no-op; the ingestion pipeline never blocks or errors on this.
    pub fn publish(&self, event: ContentCapturedEvent) {
        let _ = self.sender.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscriber_receives_published_event() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();
        bus.publish(ContentCapturedEvent {
            content_id: 1,
            source: SourceKind::Clipboard,
            captured_at: Utc::now(),
        });
        let event = rx.recv().await.unwrap();
        assert_eq!(event.content_id, 1);
    }

    #[test]
    fn publish_with_no_subscribers_does_not_panic() {
        let bus = EventBus::default();
        bus.publish(ContentCapturedEvent {
            content_id: 1,
            source: SourceKind::File,
            captured_at: Utc::now(),
        });
    }
}
