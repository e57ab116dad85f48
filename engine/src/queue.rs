//! Queue item types: durable intents to propagate record mutations.
//!
//! At most one item exists per record at a time. A newer mutation coalesces
//! into the existing pending item (last-write-wins payload, attempt count
//! preserved) rather than creating a duplicate.

use crate::{backoff::RetryPolicy, CollectionName, RecordId, Timestamp};
use serde::{Deserialize, Serialize};

/// Kind of mutation a queue item propagates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MutationKind {
    Create,
    Update,
    Delete,
}

/// Classification of a failed push.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    /// Network/timeout/server error — retried with backoff
    Transient,
    /// Validation/authorization error — never retried
    Permanent,
}

/// A durable intent to propagate one record mutation to the remote backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueItem {
    /// Unique item id
    pub id: String,
    /// Collection of the target record
    pub collection: CollectionName,
    /// Target record id
    pub record_id: RecordId,
    /// What to do on the remote
    pub operation: MutationKind,
    /// Payload snapshot to push
    pub payload: Vec<u8>,
    /// When the intent was first enqueued
    pub enqueued_at: Timestamp,
    /// Failed push attempts so far
    pub attempt_count: u32,
    /// Earliest time this item may be retried
    pub next_retry_at: Timestamp,
    /// Classification of the most recent failure
    pub last_error: Option<FailureKind>,
    /// Out of active retry, retained for inspection
    pub dead_lettered: bool,
}

impl QueueItem {
    /// Create a fresh, immediately-ready item.
    pub fn new(
        id: impl Into<String>,
        collection: impl Into<CollectionName>,
        record_id: impl Into<RecordId>,
        operation: MutationKind,
        payload: Vec<u8>,
        now: Timestamp,
    ) -> Self {
        Self {
            id: id.into(),
            collection: collection.into(),
            record_id: record_id.into(),
            operation,
            payload,
            enqueued_at: now,
            attempt_count: 0,
            next_retry_at: now,
            last_error: None,
            dead_lettered: false,
        }
    }

    /// Coalesce a newer mutation into this item.
    ///
    /// Replaces the payload, resets the retry time to immediate, and keeps
    /// `enqueued_at` so FIFO ordering is preserved. A pending item keeps its
    /// attempt count; a dead-lettered item is revived with a fresh count,
    /// since the failure streak belonged to the superseded payload.
    pub fn coalesce(&mut self, operation: MutationKind, payload: Vec<u8>, now: Timestamp) {
        self.operation = coalesced_kind(self.operation, operation);
        self.payload = payload;
        self.next_retry_at = now;
        if self.dead_lettered {
            self.dead_lettered = false;
            self.attempt_count = 0;
            self.last_error = None;
        }
    }

    /// Record a failed push and schedule the next retry or dead-letter.
    ///
    /// `jitter` is a unit value in `[-1, 1]`.
    pub fn record_failure(
        &mut self,
        kind: FailureKind,
        policy: &RetryPolicy,
        now: Timestamp,
        jitter: f64,
    ) {
        self.attempt_count += 1;
        self.last_error = Some(kind);
        match kind {
            FailureKind::Permanent => {
                self.dead_lettered = true;
            }
            FailureKind::Transient => {
                if policy.exhausted(self.attempt_count) {
                    self.dead_lettered = true;
                } else {
                    self.next_retry_at =
                        now.saturating_add(policy.delay_ms(self.attempt_count, jitter));
                }
            }
        }
    }

    /// Manually resubmit a dead-lettered item with a fresh lease.
    pub fn requeue(&mut self, now: Timestamp) {
        self.dead_lettered = false;
        self.attempt_count = 0;
        self.next_retry_at = now;
        self.last_error = None;
    }

    /// Whether this item may be handed to the worker at `now`.
    pub fn is_ready(&self, now: Timestamp) -> bool {
        !self.dead_lettered && self.next_retry_at <= now
    }
}

/// The operation a coalesced item should carry.
///
/// A record that was never created remotely keeps pushing a create; deleting
/// it cancels nothing remotely but must still push the tombstone. A deleted
/// record that is written again becomes an update of the remote copy.
fn coalesced_kind(existing: MutationKind, incoming: MutationKind) -> MutationKind {
    use MutationKind::*;
    match (existing, incoming) {
        (Create, Update) => Create,
        (Create, Delete) => Delete,
        (Delete, Create) | (Delete, Update) => Update,
        (_, incoming) => incoming,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item() -> QueueItem {
        QueueItem::new(
            "item-1",
            "settings",
            "theme",
            MutationKind::Create,
            b"dark".to_vec(),
            1000,
        )
    }

    #[test]
    fn new_item_is_immediately_ready() {
        let item = item();
        assert!(item.is_ready(1000));
        assert_eq!(item.attempt_count, 0);
        assert_eq!(item.last_error, None);
        assert!(!item.dead_lettered);
    }

    #[test]
    fn coalesce_keeps_enqueue_order_and_attempts() {
        let mut item = item();
        let policy = RetryPolicy::default();
        item.record_failure(FailureKind::Transient, &policy, 2000, 0.0);
        assert_eq!(item.attempt_count, 1);
        assert!(!item.is_ready(2500));

        item.coalesce(MutationKind::Update, b"light".to_vec(), 2500);

        assert_eq!(item.enqueued_at, 1000);
        assert_eq!(item.attempt_count, 1);
        assert_eq!(item.payload, b"light".to_vec());
        assert!(item.is_ready(2500)); // retry time reset to immediate
    }

    #[test]
    fn coalesce_revives_dead_letter_with_fresh_count() {
        let mut item = item();
        let policy = RetryPolicy {
            max_attempts: 1,
            ..Default::default()
        };
        item.record_failure(FailureKind::Transient, &policy, 2000, 0.0);
        item.record_failure(FailureKind::Transient, &policy, 3000, 0.0);
        assert!(item.dead_lettered);

        item.coalesce(MutationKind::Update, b"light".to_vec(), 4000);

        assert!(!item.dead_lettered);
        assert_eq!(item.attempt_count, 0);
        assert!(item.is_ready(4000));
    }

    #[test]
    fn create_then_update_still_creates() {
        assert_eq!(
            coalesced_kind(MutationKind::Create, MutationKind::Update),
            MutationKind::Create
        );
    }

    #[test]
    fn delete_then_write_becomes_update() {
        assert_eq!(
            coalesced_kind(MutationKind::Delete, MutationKind::Create),
            MutationKind::Update
        );
        assert_eq!(
            coalesced_kind(MutationKind::Delete, MutationKind::Update),
            MutationKind::Update
        );
    }

    #[test]
    fn transient_failures_back_off_then_dead_letter() {
        let mut item = item();
        let policy = RetryPolicy::default();

        let mut delays = Vec::new();
        for attempt in 1..=policy.max_attempts {
            item.record_failure(FailureKind::Transient, &policy, 10_000, 0.0);
            assert_eq!(item.attempt_count, attempt);
            assert!(!item.dead_lettered);
            delays.push(item.next_retry_at - 10_000);
        }
        // backoff intervals never decrease
        assert!(delays.windows(2).all(|w| w[0] <= w[1]));

        // the failure after the final allowed attempt dead-letters
        item.record_failure(FailureKind::Transient, &policy, 10_000, 0.0);
        assert!(item.dead_lettered);
        assert!(!item.is_ready(u64::MAX));
    }

    #[test]
    fn permanent_failure_dead_letters_immediately() {
        let mut item = item();
        let policy = RetryPolicy::default();

        item.record_failure(FailureKind::Permanent, &policy, 2000, 0.0);

        assert!(item.dead_lettered);
        assert_eq!(item.attempt_count, 1);
        assert_eq!(item.last_error, Some(FailureKind::Permanent));
    }

    #[test]
    fn requeue_grants_fresh_lease() {
        let mut item = item();
        let policy = RetryPolicy::default();
        item.record_failure(FailureKind::Permanent, &policy, 2000, 0.0);

        item.requeue(5000);

        assert!(!item.dead_lettered);
        assert_eq!(item.attempt_count, 0);
        assert_eq!(item.last_error, None);
        assert!(item.is_ready(5000));
    }

    #[test]
    fn serialization_roundtrip() {
        let item = item();
        let json = serde_json::to_string(&item).unwrap();
        assert!(json.contains("\"operation\":\"create\""));
        assert!(json.contains("nextRetryAt"));

        let parsed: QueueItem = serde_json::from_str(&json).unwrap();
        assert_eq!(item, parsed);
    }
}
