//! Background worker draining the sync queue against the remote backend.
//!
//! A single loop, woken by enqueue notifications, explicit wake signals, or
//! an idle poll interval. One loop means at most one in-flight remote
//! operation per record. The worker never runs on a user-facing call path;
//! every outcome it produces travels through the event bus.

use std::sync::Arc;
use std::time::Duration;

use tether_engine::{resolve, FailureKind, MutationKind, QueueItem, Record, Resolution, SyncState};
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;

use crate::error::{RemoteError, StoreError};
use crate::events::{EventBus, SyncEvent};
use crate::gate::FeatureGate;
use crate::queue::SyncQueue;
use crate::records::Catalog;
use crate::remote::{with_timeout, PushOutcome, RecordBackend};
use crate::time::now_ms;

/// The background sync loop.
pub struct SyncWorker {
    catalog: Catalog,
    queue: Arc<SyncQueue>,
    gate: Arc<FeatureGate>,
    backend: Arc<dyn RecordBackend>,
    events: EventBus,
    wake: Arc<Notify>,
    poll_interval_ms: u64,
    remote_timeout_ms: u64,
}

impl SyncWorker {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        catalog: Catalog,
        queue: Arc<SyncQueue>,
        gate: Arc<FeatureGate>,
        backend: Arc<dyn RecordBackend>,
        events: EventBus,
        wake: Arc<Notify>,
        poll_interval_ms: u64,
        remote_timeout_ms: u64,
    ) -> Self {
        Self {
            catalog,
            queue,
            gate,
            backend,
            events,
            wake,
            poll_interval_ms,
            remote_timeout_ms,
        }
    }

    /// Start the loop; it runs until `shutdown` flips to true.
    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut poll = tokio::time::interval(Duration::from_millis(self.poll_interval_ms.max(1)));
        poll.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.wake.notified() => {}
                _ = poll.tick() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
            }

            if !self.gate.remote_allowed() {
                tracing::debug!("remote gated off; sleeping until next signal");
                continue;
            }

            self.drain().await;
        }

        tracing::debug!("sync worker stopped");
    }

    async fn drain(&self) {
        for item in self.queue.dequeue_ready(now_ms()) {
            // Re-check per item so a mid-drain toggle takes effect now
            if !self.gate.remote_allowed() {
                break;
            }
            if let Err(failure) = self.process(&item).await {
                self.handle_failure(&item, failure);
            }
        }
    }

    async fn process(&self, item: &QueueItem) -> Result<(), RemoteError> {
        if item.operation == MutationKind::Delete {
            with_timeout(
                self.remote_timeout_ms,
                self.backend.delete_record(&item.collection, &item.record_id),
            )
            .await?;
            self.ack(item)?;
            self.emit_state(item, SyncState::Clean);
            return Ok(());
        }

        let Some(mut record) = self.load_record(item)? else {
            // Record vanished locally since enqueue; nothing left to push
            self.ack(item)?;
            return Ok(());
        };

        // A remote version strictly ahead of what we last saw means both
        // sides changed: resolve before pushing.
        let remote = with_timeout(
            self.remote_timeout_ms,
            self.backend.fetch_record(&item.collection, &item.record_id),
        )
        .await?;

        if let Some(remote_record) = remote {
            let known = record.remote_version.unwrap_or(0);
            if remote_record.local_version > known {
                let lock = self.catalog.record_lock(&item.collection, &item.record_id);
                let resolution = {
                    // Reload under the record lock so resolution sees any
                    // foreground write that landed since the first load
                    let _guard = lock.lock().expect("record lock poisoned");
                    let Some(mut current) = self.load_record(item)? else {
                        self.ack(item)?;
                        return Ok(());
                    };
                    current.observe_remote(remote_record.local_version);
                    let resolved = resolve(&current, &remote_record);
                    self.save_record(&resolved.record)?;
                    if resolved.resolution == Resolution::RemoteWins {
                        self.ack(item)?;
                    } else {
                        record = resolved.record;
                    }
                    resolved.resolution
                };
                tracing::info!(
                    collection = %item.collection,
                    record_id = %item.record_id,
                    ?resolution,
                    "conflict resolved"
                );
                if resolution == Resolution::RemoteWins {
                    // Local mutation lost; the remote copy was adopted
                    self.emit_state(item, SyncState::Clean);
                    return Ok(());
                }
            }
        }

        let pushed_version = record.local_version;
        let outcome = with_timeout(
            self.remote_timeout_ms,
            self.backend.push_record(&record, record.remote_version),
        )
        .await?;

        match outcome {
            PushOutcome::Accepted { version } => {
                let lock = self.catalog.record_lock(&item.collection, &item.record_id);
                let became_clean = {
                    // Reload under the lock: a newer mutation may have landed
                    // mid-push, in which case its item stays queued
                    let _guard = lock.lock().expect("record lock poisoned");
                    let mut latest = self.load_record(item)?.unwrap_or(record);
                    latest.mark_pushed(version);
                    self.save_record(&latest)?;
                    if latest.local_version == pushed_version {
                        self.ack(item)?;
                        true
                    } else {
                        false
                    }
                };

                if became_clean {
                    self.emit_state(item, SyncState::Clean);
                } else {
                    tracing::debug!(
                        collection = %item.collection,
                        record_id = %item.record_id,
                        "newer mutation landed during push; item stays queued"
                    );
                }
                Ok(())
            }
            PushOutcome::Conflict { .. } => Err(RemoteError::Transient(
                "remote version advanced during push".into(),
            )),
        }
    }

    fn handle_failure(&self, item: &QueueItem, failure: RemoteError) {
        let kind = failure.classification();
        tracing::warn!(
            collection = %item.collection,
            record_id = %item.record_id,
            %failure,
            "push failed"
        );

        if let Err(store_err) = self
            .queue
            .fail(&item.collection, &item.record_id, kind, now_ms())
        {
            tracing::error!(%store_err, "failed to persist queue failure");
        }

        if kind == FailureKind::Permanent {
            self.events.emit(SyncEvent::SyncFailedPermanently {
                collection: item.collection.clone(),
                record_id: item.record_id.clone(),
                reason: failure.reason().to_string(),
            });
        }
    }

    fn load_record(&self, item: &QueueItem) -> Result<Option<Record>, RemoteError> {
        self.catalog
            .load_record(&item.collection, &item.record_id)
            .map_err(store_transient)
    }

    fn save_record(&self, record: &Record) -> Result<(), RemoteError> {
        self.catalog.save_record(record).map_err(store_transient)
    }

    fn ack(&self, item: &QueueItem) -> Result<(), RemoteError> {
        self.queue
            .ack(&item.collection, &item.record_id)
            .map(|_| ())
            .map_err(store_transient)
    }

    fn emit_state(&self, item: &QueueItem, state: SyncState) {
        self.events.emit(SyncEvent::SyncStateChanged {
            collection: item.collection.clone(),
            record_id: item.record_id.clone(),
            state,
        });
    }
}

/// Store failures during a drain are logged and retried like transients; the
/// synchronous write path is where store errors surface to callers.
fn store_transient(err: StoreError) -> RemoteError {
    tracing::error!(%err, "local store error during sync");
    RemoteError::Transient(format!("local store error: {err}"))
}
