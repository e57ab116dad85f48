//! Process-wide facade wiring the components together.
//!
//! Components are constructed once, here, and passed by reference — no
//! singletons, no globals — so any of them can be replaced by a test double.

use std::sync::{Arc, Mutex};

use tether_engine::{keys, MutationClock, MutationKind, Record};
use tokio::sync::{broadcast, watch, Notify};
use tokio::task::JoinHandle;

use crate::config::Config;
use crate::content::{ContentCache, ContentResult};
use crate::error::StoreResult;
use crate::events::{EventBus, SyncEvent};
use crate::gate::{Connectivity, FeatureGate, FlagSource};
use crate::queue::SyncQueue;
use crate::records::Catalog;
use crate::remote::{capability_of, ContentBackend, RecordBackend};
use crate::store::LocalStore;
use crate::time::now_ms;
use crate::worker::SyncWorker;

/// The local-first sync core, assembled.
///
/// Writes are synchronous and land in local storage before this returns;
/// propagation to the remote happens on the background worker and reports
/// through the event bus.
pub struct SyncService {
    catalog: Catalog,
    queue: Arc<SyncQueue>,
    gate: Arc<FeatureGate>,
    events: EventBus,
    content: ContentCache,
    clock: Mutex<MutationClock>,
    wake: Arc<Notify>,
    shutdown: watch::Sender<bool>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl SyncService {
    /// Wire up the service and start the background worker.
    pub fn new(
        store: Arc<dyn LocalStore>,
        record_backend: Arc<dyn RecordBackend>,
        content_backend: Arc<dyn ContentBackend>,
        flags: Arc<dyn FlagSource>,
        connectivity: Option<Arc<Connectivity>>,
        config: Config,
    ) -> StoreResult<Self> {
        let catalog = Catalog::new(store);
        let queue = Arc::new(SyncQueue::recover(catalog.clone(), config.retry)?);
        let gate = Arc::new(FeatureGate::new(
            flags,
            capability_of(record_backend.clone()),
            connectivity,
        ));
        let events = EventBus::default();
        let clock = Mutex::new(MutationClock::with_floor(catalog.latest_timestamp()?));
        let wake = Arc::new(Notify::new());
        let (shutdown, shutdown_rx) = watch::channel(false);

        let worker = SyncWorker::new(
            catalog.clone(),
            queue.clone(),
            gate.clone(),
            record_backend,
            events.clone(),
            wake.clone(),
            config.poll_interval_ms,
            config.remote_timeout_ms,
        )
        .spawn(shutdown_rx);

        let content = ContentCache::new(
            catalog.clone(),
            gate.clone(),
            content_backend,
            events.clone(),
            config.content_ttl_ms,
            config.remote_timeout_ms,
        );

        Ok(Self {
            catalog,
            queue,
            gate,
            events,
            content,
            clock,
            wake,
            shutdown,
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Write a record. Synchronous, durable, and independent of network
    /// state; the mutation is queued for propagation as a side effect.
    pub fn put(&self, collection: &str, id: &str, payload: Vec<u8>) -> StoreResult<Record> {
        keys::validate_collection(collection)?;
        let now = self
            .clock
            .lock()
            .expect("clock lock poisoned")
            .stamp(now_ms());

        let lock = self.catalog.record_lock(collection, id);
        let record = {
            let _guard = lock.lock().expect("record lock poisoned");

            let record = match self.catalog.load_record(collection, id)? {
                Some(mut record) => {
                    record.mutate(payload.clone(), now);
                    record
                }
                None => Record::new(id, collection, payload.clone(), now),
            };
            self.catalog.save_record(&record)?;

            let operation = if record.remote_version.is_none() {
                MutationKind::Create
            } else {
                MutationKind::Update
            };
            self.queue.enqueue(collection, id, operation, payload, now)?;
            record
        };

        self.events.emit(SyncEvent::SyncStateChanged {
            collection: collection.to_string(),
            record_id: id.to_string(),
            state: record.sync_state,
        });
        self.wake.notify_one();
        Ok(record)
    }

    /// Read a record from local storage.
    pub fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Record>> {
        self.catalog.load_record(collection, id)
    }

    /// All records in a collection, in id order.
    pub fn list(&self, collection: &str) -> StoreResult<Vec<Record>> {
        self.catalog.records_in(collection)
    }

    /// Delete a record locally and queue the remote tombstone.
    pub fn delete(&self, collection: &str, id: &str) -> StoreResult<()> {
        keys::validate_collection(collection)?;
        let now = self
            .clock
            .lock()
            .expect("clock lock poisoned")
            .stamp(now_ms());

        let lock = self.catalog.record_lock(collection, id);
        {
            let _guard = lock.lock().expect("record lock poisoned");
            self.catalog.delete_record(collection, id)?;
            self.queue
                .enqueue(collection, id, MutationKind::Delete, Vec::new(), now)?;
        }

        self.events.emit(SyncEvent::SyncStateChanged {
            collection: collection.to_string(),
            record_id: id.to_string(),
            state: tether_engine::SyncState::PendingPush,
        });
        self.wake.notify_one();
        Ok(())
    }

    /// Read content through the cache. Never blocks on the network.
    pub fn content(&self, content_key: &str) -> StoreResult<ContentResult> {
        self.content.get(content_key)
    }

    /// The content cache, for observability accessors.
    pub fn content_cache(&self) -> &ContentCache {
        &self.content
    }

    /// The sync queue, for inspection and manual requeue of dead letters.
    pub fn queue(&self) -> &SyncQueue {
        &self.queue
    }

    /// The feature gate.
    pub fn gate(&self) -> &FeatureGate {
        &self.gate
    }

    /// Subscribe to sync and content events.
    pub fn events(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    /// Foreground/reconnect signal: wake the worker now.
    pub fn wake(&self) {
        self.wake.notify_one();
    }

    /// Stop the worker and wait for its current cycle to finish.
    pub async fn shutdown(&self) {
        let _ = self.shutdown.send(true);
        let handle = self.worker.lock().expect("worker lock poisoned").take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}
