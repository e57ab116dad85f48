//! The asynchronous event surface.
//!
//! All remote-path outcomes reach callers through these events; nothing in
//! the sync path throws into or blocks a user-facing call.

use tether_engine::SyncState;
use tokio::sync::broadcast;

/// Events produced by the sync worker and content cache.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    /// A record's sync state changed.
    SyncStateChanged {
        collection: String,
        record_id: String,
        state: SyncState,
    },
    /// A push failed permanently and will not be retried.
    SyncFailedPermanently {
        collection: String,
        record_id: String,
        reason: String,
    },
    /// A content bundle was replaced with a new revision.
    ContentRefreshed {
        content_key: String,
        revision: String,
    },
}

/// Broadcast fan-out for [`SyncEvent`]s.
///
/// Emission never blocks; subscribers that fall behind lose the oldest
/// events, which is acceptable for a UI/observability surface.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<SyncEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.tx.subscribe()
    }

    pub fn emit(&self, event: SyncEvent) {
        tracing::debug!(?event, "sync event");
        // No subscribers is fine
        let _ = self.tx.send(event);
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
    async fn subscribers_receive_emitted_events() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();

        bus.emit(SyncEvent::ContentRefreshed {
            content_key: "lessons/intro".into(),
            revision: "rev-1".into(),
        });

        let event = rx.recv().await.unwrap();
        assert!(matches!(event, SyncEvent::ContentRefreshed { .. }));
    }

    #[test]
    fn emit_without_subscribers_does_not_panic() {
        let bus = EventBus::default();
        bus.emit(SyncEvent::SyncStateChanged {
            collection: "settings".into(),
            record_id: "theme".into(),
            state: SyncState::Clean,
        });
    }
}
