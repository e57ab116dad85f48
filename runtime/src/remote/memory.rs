//! In-process backend for tests and demos.
//!
//! Behaves like a well-mannered remote: optimistic version checks on push,
//! revisioned content, and injectable failures for exercising the retry and
//! dead-letter paths.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tether_engine::{Record, SyncState, Version};

use super::{ContentBackend, PushOutcome, RecordBackend};
use crate::error::RemoteError;
use crate::gate::Capability;

/// An in-memory implementation of both adapter traits.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    records: Mutex<HashMap<(String, String), Record>>,
    content: Mutex<HashMap<String, (String, Vec<u8>)>>,
    failure: Mutex<Option<RemoteError>>,
}

impl MemoryBackend {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// While set, every call fails with a clone of this error.
    pub fn set_failure(&self, failure: Option<RemoteError>) {
        *self.failure.lock().expect("backend lock poisoned") = failure;
    }

    /// The backend's current copy of a record.
    pub fn record(&self, collection: &str, id: &str) -> Option<Record> {
        self.records
            .lock()
            .expect("backend lock poisoned")
            .get(&(collection.to_string(), id.to_string()))
            .cloned()
    }

    /// Publish content at a revision.
    pub fn put_content(&self, content_key: &str, revision: &str, payload: Vec<u8>) {
        self.content
            .lock()
            .expect("backend lock poisoned")
            .insert(content_key.to_string(), (revision.to_string(), payload));
    }

    /// Seed a record as if another client had pushed it.
    pub fn seed_record(&self, record: Record) {
        self.records
            .lock()
            .expect("backend lock poisoned")
            .insert((record.collection.clone(), record.id.clone()), record);
    }

    fn check_failure(&self) -> Result<(), RemoteError> {
        match &*self.failure.lock().expect("backend lock poisoned") {
            Some(failure) => Err(failure.clone()),
            None => Ok(()),
        }
    }
}

impl Capability for MemoryBackend {
    fn available(&self) -> bool {
        true
    }
}

#[async_trait]
impl RecordBackend for MemoryBackend {
    async fn push_record(
        &self,
        record: &Record,
        expected_remote_version: Option<Version>,
    ) -> Result<PushOutcome, RemoteError> {
        self.check_failure()?;

        let mut records = self.records.lock().expect("backend lock poisoned");
        let key = (record.collection.clone(), record.id.clone());

        let current_version = records.get(&key).map(|r| r.local_version);
        if current_version != expected_remote_version && current_version.is_some() {
            return Ok(PushOutcome::Conflict {
                current: records.get(&key).cloned(),
            });
        }

        let version = record.local_version;
        let mut stored = record.clone();
        stored.remote_version = Some(version);
        stored.sync_state = SyncState::Clean;
        records.insert(key, stored);

        Ok(PushOutcome::Accepted { version })
    }

    async fn fetch_record(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<Record>, RemoteError> {
        self.check_failure()?;
        Ok(self
            .records
            .lock()
            .expect("backend lock poisoned")
            .get(&(collection.to_string(), id.to_string()))
            .cloned())
    }

    async fn delete_record(&self, collection: &str, id: &str) -> Result<(), RemoteError> {
        self.check_failure()?;
        self.records
            .lock()
            .expect("backend lock poisoned")
            .remove(&(collection.to_string(), id.to_string()));
        Ok(())
    }
}

#[async_trait]
impl ContentBackend for MemoryBackend {
    async fn fetch_revision(&self, content_key: &str) -> Result<String, RemoteError> {
        self.check_failure()?;
        self.content
            .lock()
            .expect("backend lock poisoned")
            .get(content_key)
            .map(|(revision, _)| revision.clone())
            .ok_or_else(|| RemoteError::Permanent(format!("unknown content key: {content_key}")))
    }

    async fn fetch_payload(
        &self,
        content_key: &str,
        revision: &str,
    ) -> Result<Vec<u8>, RemoteError> {
        self.check_failure()?;
        let content = self.content.lock().expect("backend lock poisoned");
        match content.get(content_key) {
            Some((current, payload)) if current == revision => Ok(payload.clone()),
            Some(_) => Err(RemoteError::Transient(format!(
                "revision {revision} superseded for {content_key}"
            ))),
            None => Err(RemoteError::Permanent(format!(
                "unknown content key: {content_key}"
            ))),
        }
    }
}
