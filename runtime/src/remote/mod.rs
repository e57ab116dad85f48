//! Remote adapter contracts.
//!
//! The backend's wire protocol is out of scope: these traits treat it as an
//! opaque document API and an opaque versioned-content API. A no-op
//! implementation stands in when no backend is configured, which keeps the
//! system local-only without compile-time branching.

pub mod memory;

pub use memory::MemoryBackend;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tether_engine::{Record, Version};

use crate::error::RemoteError;
use crate::gate::Capability;

/// Outcome of a push the backend processed.
#[derive(Debug, Clone, PartialEq)]
pub enum PushOutcome {
    /// The backend stored the record at this version.
    Accepted { version: Version },
    /// The backend holds a version other than the expected one.
    Conflict { current: Option<Record> },
}

/// A remote key-value/document backend for records.
#[async_trait]
pub trait RecordBackend: Capability {
    /// Push a record, expecting the backend to currently hold
    /// `expected_remote_version` (or nothing, for a first push).
    async fn push_record(
        &self,
        record: &Record,
        expected_remote_version: Option<Version>,
    ) -> Result<PushOutcome, RemoteError>;

    /// Fetch the backend's current copy of a record.
    ///
    /// In the returned record, `local_version` carries the backend's version
    /// counter.
    async fn fetch_record(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<Record>, RemoteError>;

    /// Remove a record from the backend. Removing an absent record succeeds.
    async fn delete_record(&self, collection: &str, id: &str) -> Result<(), RemoteError>;
}

/// A remote source of versioned, read-mostly content.
#[async_trait]
pub trait ContentBackend: Capability {
    /// The current revision identifier for a content key.
    async fn fetch_revision(&self, content_key: &str) -> Result<String, RemoteError>;

    /// The full payload of a content key at a given revision.
    async fn fetch_payload(
        &self,
        content_key: &str,
        revision: &str,
    ) -> Result<Vec<u8>, RemoteError>;
}

/// Stands in when no remote backend is configured.
///
/// Reports itself unavailable, so the feature gate keeps the system
/// local-only and none of these methods are ever reached through the worker
/// or the cache.
#[derive(Debug, Default)]
pub struct NoopBackend;

impl Capability for NoopBackend {
    fn available(&self) -> bool {
        false
    }
}

#[async_trait]
impl RecordBackend for NoopBackend {
    async fn push_record(
        &self,
        _record: &Record,
        _expected_remote_version: Option<Version>,
    ) -> Result<PushOutcome, RemoteError> {
        Err(RemoteError::Permanent("no remote backend configured".into()))
    }

    async fn fetch_record(
        &self,
        _collection: &str,
        _id: &str,
    ) -> Result<Option<Record>, RemoteError> {
        Err(RemoteError::Permanent("no remote backend configured".into()))
    }

    async fn delete_record(&self, _collection: &str, _id: &str) -> Result<(), RemoteError> {
        Err(RemoteError::Permanent("no remote backend configured".into()))
    }
}

#[async_trait]
impl ContentBackend for NoopBackend {
    async fn fetch_revision(&self, _content_key: &str) -> Result<String, RemoteError> {
        Err(RemoteError::Permanent("no remote backend configured".into()))
    }

    async fn fetch_payload(
        &self,
        _content_key: &str,
        _revision: &str,
    ) -> Result<Vec<u8>, RemoteError> {
        Err(RemoteError::Permanent("no remote backend configured".into()))
    }
}

/// Expose a record backend's capability to the feature gate.
pub fn capability_of(backend: Arc<dyn RecordBackend>) -> Arc<dyn Capability> {
    struct BackendCapability(Arc<dyn RecordBackend>);
    impl Capability for BackendCapability {
        fn available(&self) -> bool {
            self.0.available()
        }
    }
    Arc::new(BackendCapability(backend))
}

/// Run a remote call under the configured timeout.
///
/// An elapsed timeout is a transient failure like any other network error.
pub(crate) async fn with_timeout<T, F>(timeout_ms: u64, call: F) -> Result<T, RemoteError>
where
    F: Future<Output = Result<T, RemoteError>> + Send,
{
    match tokio::time::timeout(Duration::from_millis(timeout_ms), call).await {
        Ok(result) => result,
        Err(_) => Err(RemoteError::Transient(format!(
            "remote call timed out after {timeout_ms}ms"
        ))),
    }
}
