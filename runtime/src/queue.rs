//! Durable, ordered queue of pending record mutations.
//!
//! Every state change writes through the local store before it is visible,
//! so a crash replays to an identical queue. At most one item exists per
//! record; newer mutations coalesce into it.

use std::collections::HashMap;
use std::sync::Mutex;

use rand::Rng;
use tether_engine::{FailureKind, MutationKind, QueueItem, RetryPolicy, Timestamp};

use crate::error::StoreResult;
use crate::records::Catalog;

type RecordKey = (String, String);

/// The durable write-ahead sync queue.
pub struct SyncQueue {
    catalog: Catalog,
    policy: RetryPolicy,
    items: Mutex<HashMap<RecordKey, QueueItem>>,
}

impl SyncQueue {
    /// Rebuild the queue from persisted state.
    pub fn recover(catalog: Catalog, policy: RetryPolicy) -> StoreResult<Self> {
        let mut items = HashMap::new();
        for item in catalog.all_queue_items()? {
            items.insert((item.collection.clone(), item.record_id.clone()), item);
        }
        if !items.is_empty() {
            tracing::info!(pending = items.len(), "recovered sync queue");
        }
        Ok(Self {
            catalog,
            policy,
            items: Mutex::new(items),
        })
    }

    /// The retry policy this queue schedules with.
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Append a mutation, coalescing with any pending item for the record.
    pub fn enqueue(
        &self,
        collection: &str,
        record_id: &str,
        operation: MutationKind,
        payload: Vec<u8>,
        now: Timestamp,
    ) -> StoreResult<QueueItem> {
        let mut items = self.items.lock().expect("queue lock poisoned");
        let key = (collection.to_string(), record_id.to_string());

        let item = match items.get_mut(&key) {
            Some(existing) => {
                existing.coalesce(operation, payload, now);
                existing.clone()
            }
            None => {
                let item = QueueItem::new(
                    uuid::Uuid::new_v4().to_string(),
                    collection,
                    record_id,
                    operation,
                    payload,
                    now,
                );
                items.insert(key, item.clone());
                item
            }
        };

        self.catalog.save_queue_item(&item)?;
        tracing::debug!(
            collection = %item.collection,
            record_id = %item.record_id,
            attempts = item.attempt_count,
            "enqueued mutation"
        );
        Ok(item)
    }

    /// Items eligible for a push attempt at `now`, FIFO by enqueue time.
    ///
    /// Dead-lettered and backed-off items are skipped, so one failing record
    /// never blocks the rest of the queue.
    pub fn dequeue_ready(&self, now: Timestamp) -> Vec<QueueItem> {
        let items = self.items.lock().expect("queue lock poisoned");
        let mut ready: Vec<QueueItem> = items
            .values()
            .filter(|item| item.is_ready(now))
            .cloned()
            .collect();
        ready.sort_by(|a, b| {
            a.enqueued_at
                .cmp(&b.enqueued_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        ready
    }

    /// Remove a propagated item. Returns it if it was present.
    pub fn ack(&self, collection: &str, record_id: &str) -> StoreResult<Option<QueueItem>> {
        let mut items = self.items.lock().expect("queue lock poisoned");
        let key = (collection.to_string(), record_id.to_string());
        let removed = items.remove(&key);
        if removed.is_some() {
            self.catalog.delete_queue_item(collection, record_id)?;
        }
        Ok(removed)
    }

    /// Record a failed push attempt; schedules the retry or dead-letters.
    pub fn fail(
        &self,
        collection: &str,
        record_id: &str,
        kind: FailureKind,
        now: Timestamp,
    ) -> StoreResult<Option<QueueItem>> {
        let mut items = self.items.lock().expect("queue lock poisoned");
        let key = (collection.to_string(), record_id.to_string());
        let Some(item) = items.get_mut(&key) else {
            return Ok(None);
        };

        let jitter = rand::thread_rng().gen_range(-1.0..=1.0);
        item.record_failure(kind, &self.policy, now, jitter);
        self.catalog.save_queue_item(item)?;

        if item.dead_lettered {
            tracing::warn!(
                collection,
                record_id,
                attempts = item.attempt_count,
                ?kind,
                "queue item dead-lettered"
            );
        }
        Ok(Some(item.clone()))
    }

    /// Manually resubmit a dead-lettered item.
    pub fn requeue(
        &self,
        collection: &str,
        record_id: &str,
        now: Timestamp,
    ) -> StoreResult<Option<QueueItem>> {
        let mut items = self.items.lock().expect("queue lock poisoned");
        let key = (collection.to_string(), record_id.to_string());
        let Some(item) = items.get_mut(&key) else {
            return Ok(None);
        };
        item.requeue(now);
        self.catalog.save_queue_item(item)?;
        Ok(Some(item.clone()))
    }

    /// Dead-lettered items, retained for inspection.
    pub fn dead_letters(&self) -> Vec<QueueItem> {
        let items = self.items.lock().expect("queue lock poisoned");
        let mut dead: Vec<QueueItem> = items
            .values()
            .filter(|item| item.dead_lettered)
            .cloned()
            .collect();
        dead.sort_by(|a, b| a.enqueued_at.cmp(&b.enqueued_at));
        dead
    }

    /// Items still awaiting propagation, dead-lettered included.
    pub fn len(&self) -> usize {
        self.items.lock().expect("queue lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Items in active retry (dead-lettered excluded).
    pub fn pending_len(&self) -> usize {
        self.items
            .lock()
            .expect("queue lock poisoned")
            .values()
            .filter(|item| !item.dead_lettered)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use std::sync::Arc;

    fn queue() -> SyncQueue {
        let catalog = Catalog::new(Arc::new(MemoryStore::new()));
        SyncQueue::recover(catalog, RetryPolicy::default()).unwrap()
    }

    #[test]
    fn enqueue_then_ack_empties_queue() {
        let queue = queue();
        queue
            .enqueue("settings", "theme", MutationKind::Create, b"dark".to_vec(), 1000)
            .unwrap();
        assert_eq!(queue.len(), 1);

        let acked = queue.ack("settings", "theme").unwrap();
        assert!(acked.is_some());
        assert!(queue.is_empty());
    }

    #[test]
    fn second_mutation_coalesces_into_one_item() {
        let queue = queue();
        queue
            .enqueue("settings", "theme", MutationKind::Create, b"dark".to_vec(), 1000)
            .unwrap();
        queue
            .enqueue("settings", "theme", MutationKind::Update, b"light".to_vec(), 2000)
            .unwrap();

        assert_eq!(queue.len(), 1);
        let ready = queue.dequeue_ready(2000);
        assert_eq!(ready.len(), 1);
        assert_eq!(ready[0].payload, b"light".to_vec());
        assert_eq!(ready[0].enqueued_at, 1000);
        // never pushed remotely, so still a create
        assert_eq!(ready[0].operation, MutationKind::Create);
    }

    #[test]
    fn coalescing_preserves_attempt_count() {
        let queue = queue();
        queue
            .enqueue("settings", "theme", MutationKind::Create, b"dark".to_vec(), 1000)
            .unwrap();
        queue
            .fail("settings", "theme", FailureKind::Transient, 1500)
            .unwrap();

        queue
            .enqueue("settings", "theme", MutationKind::Update, b"light".to_vec(), 2000)
            .unwrap();

        let ready = queue.dequeue_ready(2000);
        assert_eq!(ready.len(), 1);
        assert_eq!(ready[0].attempt_count, 1);
        assert_eq!(ready[0].payload, b"light".to_vec());
    }

    #[test]
    fn dequeue_ready_is_fifo_and_skips_backed_off() {
        let queue = queue();
        queue
            .enqueue("a", "1", MutationKind::Create, vec![], 3000)
            .unwrap();
        queue
            .enqueue("b", "2", MutationKind::Create, vec![], 1000)
            .unwrap();
        queue
            .enqueue("c", "3", MutationKind::Create, vec![], 2000)
            .unwrap();

        // "c" fails and backs off past `now`
        queue.fail("c", "3", FailureKind::Transient, 3000).unwrap();

        let ready = queue.dequeue_ready(3000);
        let order: Vec<&str> = ready.iter().map(|i| i.collection.as_str()).collect();
        assert_eq!(order, vec!["b", "a"]);
    }

    #[test]
    fn dead_letters_are_retained_and_requeueable() {
        let catalog = Catalog::new(Arc::new(MemoryStore::new()));
        let policy = RetryPolicy {
            max_attempts: 0,
            ..Default::default()
        };
        let queue = SyncQueue::recover(catalog, policy).unwrap();

        queue
            .enqueue("settings", "theme", MutationKind::Create, vec![], 1000)
            .unwrap();
        queue
            .fail("settings", "theme", FailureKind::Transient, 1500)
            .unwrap();

        assert!(queue.dequeue_ready(u64::MAX).is_empty());
        assert_eq!(queue.dead_letters().len(), 1);
        assert_eq!(queue.pending_len(), 0);
        assert_eq!(queue.len(), 1);

        queue.requeue("settings", "theme", 2000).unwrap();
        assert_eq!(queue.dequeue_ready(2000).len(), 1);
        assert!(queue.dead_letters().is_empty());
    }

    #[test]
    fn recovery_rebuilds_identical_queue() {
        let store = Arc::new(MemoryStore::new());
        let catalog = Catalog::new(store.clone());

        let queue = SyncQueue::recover(catalog.clone(), RetryPolicy::default()).unwrap();
        queue
            .enqueue("settings", "theme", MutationKind::Create, b"dark".to_vec(), 1000)
            .unwrap();
        queue
            .enqueue("streaks", "me", MutationKind::Create, b"7".to_vec(), 2000)
            .unwrap();
        queue
            .fail("streaks", "me", FailureKind::Transient, 2500)
            .unwrap();

        let before = {
            let mut items = queue.dequeue_ready(u64::MAX);
            items.extend(queue.dead_letters());
            items
        };

        // "restart": a fresh queue over the same store
        let recovered = SyncQueue::recover(catalog, RetryPolicy::default()).unwrap();
        assert_eq!(recovered.len(), 2);

        let after = {
            let mut items = recovered.dequeue_ready(u64::MAX);
            items.extend(recovered.dead_letters());
            items
        };
        assert_eq!(before, after);
    }
}
