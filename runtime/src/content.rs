//! Remote content cache: serve the local copy now, revalidate in the
//! background.
//!
//! Reads never block on the network. A stale or missing bundle schedules a
//! deduplicated background refresh when the gate allows; refresh failures
//! stay invisible to callers (the cached copy remains authoritative) but are
//! counted and kept for observability.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tether_engine::{ContentBundle, Freshness};
use tokio::task::JoinHandle;

use crate::error::StoreResult;
use crate::events::{EventBus, SyncEvent};
use crate::gate::FeatureGate;
use crate::records::Catalog;
use crate::remote::{with_timeout, ContentBackend};
use crate::time::now_ms;

/// Result of a content read.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentResult {
    /// The best available local copy.
    Available {
        payload: Vec<u8>,
        freshness: Freshness,
    },
    /// Nothing cached yet; callers must handle the empty state explicitly.
    NotYetAvailable,
}

/// Cache-then-revalidate fetcher for versioned remote content.
pub struct ContentCache {
    inner: Arc<CacheInner>,
}

struct CacheInner {
    catalog: Catalog,
    gate: Arc<FeatureGate>,
    backend: Arc<dyn ContentBackend>,
    events: EventBus,
    default_ttl_ms: u64,
    remote_timeout_ms: u64,
    inflight: DashMap<String, JoinHandle<()>>,
    last_errors: DashMap<String, String>,
    failure_count: AtomicU64,
}

impl ContentCache {
    pub fn new(
        catalog: Catalog,
        gate: Arc<FeatureGate>,
        backend: Arc<dyn ContentBackend>,
        events: EventBus,
        default_ttl_ms: u64,
        remote_timeout_ms: u64,
    ) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                catalog,
                gate,
                backend,
                events,
                default_ttl_ms,
                remote_timeout_ms,
                inflight: DashMap::new(),
                last_errors: DashMap::new(),
                failure_count: AtomicU64::new(0),
            }),
        }
    }

    /// Serve the best available local bundle. Never blocks on the network.
    pub fn get(&self, content_key: &str) -> StoreResult<ContentResult> {
        let now = now_ms();
        let allowed = self.inner.gate.remote_allowed();

        match self.inner.catalog.load_bundle(content_key)? {
            Some(bundle) => {
                let freshness = bundle.freshness(now, allowed);
                if freshness == Freshness::Stale {
                    self.schedule_refresh(content_key);
                }
                Ok(ContentResult::Available {
                    payload: bundle.payload,
                    freshness,
                })
            }
            None => {
                if allowed {
                    self.schedule_refresh(content_key);
                }
                Ok(ContentResult::NotYetAvailable)
            }
        }
    }

    /// Total refresh failures since startup.
    pub fn refresh_failures(&self) -> u64 {
        self.inner.failure_count.load(Ordering::Relaxed)
    }

    /// The reason the last refresh of `content_key` failed, if it did.
    pub fn last_refresh_error(&self, content_key: &str) -> Option<String> {
        self.inner
            .last_errors
            .get(content_key)
            .map(|entry| entry.value().clone())
    }

    fn schedule_refresh(&self, content_key: &str) {
        use dashmap::mapref::entry::Entry;

        match self.inner.inflight.entry(content_key.to_string()) {
            Entry::Occupied(mut occupied) => {
                if !occupied.get().is_finished() {
                    return;
                }
                occupied.insert(self.spawn_refresh(content_key));
            }
            Entry::Vacant(vacant) => {
                vacant.insert(self.spawn_refresh(content_key));
            }
        }
    }

    fn spawn_refresh(&self, content_key: &str) -> JoinHandle<()> {
        let inner = self.inner.clone();
        let key = content_key.to_string();
        tokio::spawn(async move { inner.refresh(&key).await })
    }
}

impl Drop for ContentCache {
    fn drop(&mut self) {
        // In-flight refreshes are abandoned, not awaited
        for entry in self.inner.inflight.iter() {
            entry.value().abort();
        }
    }
}

impl CacheInner {
    async fn refresh(&self, content_key: &str) {
        // The gate may have flipped between scheduling and running
        if !self.gate.remote_allowed() {
            return;
        }

        match self.try_refresh(content_key).await {
            Ok(()) => {
                self.last_errors.remove(content_key);
            }
            Err(reason) => {
                self.failure_count.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(content_key, %reason, "content refresh failed");
                self.last_errors.insert(content_key.to_string(), reason);
            }
        }
    }

    async fn try_refresh(&self, content_key: &str) -> Result<(), String> {
        let revision = with_timeout(
            self.remote_timeout_ms,
            self.backend.fetch_revision(content_key),
        )
        .await
        .map_err(|e| e.to_string())?;

        let now = now_ms();
        let existing = self
            .catalog
            .load_bundle(content_key)
            .map_err(|e| e.to_string())?;
        let ttl_ms = existing.as_ref().map_or(self.default_ttl_ms, |b| b.ttl_ms);

        if let Some(mut bundle) = existing {
            if !bundle.superseded_by(&revision) {
                // Unchanged upstream: extend the bundle's life
                bundle.revalidated(now);
                self.catalog.save_bundle(&bundle).map_err(|e| e.to_string())?;
                tracing::debug!(content_key, revision = %revision, "content revalidated");
                return Ok(());
            }
        }

        let payload = with_timeout(
            self.remote_timeout_ms,
            self.backend.fetch_payload(content_key, &revision),
        )
        .await
        .map_err(|e| e.to_string())?;

        let bundle = ContentBundle::new(content_key, revision.clone(), payload, now, ttl_ms);
        self.catalog.save_bundle(&bundle).map_err(|e| e.to_string())?;

        tracing::info!(content_key, revision = %revision, "content bundle replaced");
        self.events.emit(SyncEvent::ContentRefreshed {
            content_key: content_key.to_string(),
            revision,
        });
        Ok(())
    }
}
