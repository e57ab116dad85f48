//! Typed catalog over the raw byte store.
//!
//! Translates between engine types and their persisted form. Every record,
//! queue item, and content bundle is an independent store entry under the
//! key layout in [`tether_engine::keys`].

use std::sync::{Arc, Mutex};

use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tether_engine::{keys, ContentBundle, QueueItem, Record, Timestamp};

use crate::error::{StoreError, StoreResult};
use crate::store::LocalStore;

/// Typed access to records, queue items, and content bundles.
#[derive(Clone)]
pub struct Catalog {
    store: Arc<dyn LocalStore>,
    record_locks: Arc<DashMap<(String, String), Arc<Mutex<()>>>>,
}

impl Catalog {
    pub fn new(store: Arc<dyn LocalStore>) -> Self {
        Self {
            store,
            record_locks: Arc::new(DashMap::new()),
        }
    }

    /// The underlying byte store.
    pub fn store(&self) -> &Arc<dyn LocalStore> {
        &self.store
    }

    /// The logical lock serializing read-modify-write cycles on one record.
    ///
    /// Writers to the same record take this lock around load + save; writers
    /// to different records proceed independently. Never hold it across an
    /// await point.
    pub fn record_lock(&self, collection: &str, id: &str) -> Arc<Mutex<()>> {
        self.record_locks
            .entry((collection.to_string(), id.to_string()))
            .or_default()
            .clone()
    }

    // ------------------------------------------------------------------
    // Records
    // ------------------------------------------------------------------

    pub fn load_record(&self, collection: &str, id: &str) -> StoreResult<Option<Record>> {
        let key = keys::record_key(collection, id);
        self.load(&key)
    }

    pub fn save_record(&self, record: &Record) -> StoreResult<()> {
        let key = keys::record_key(&record.collection, &record.id);
        self.save(&key, record)
    }

    pub fn delete_record(&self, collection: &str, id: &str) -> StoreResult<()> {
        self.store.delete(&keys::record_key(collection, id))
    }

    /// All records in one collection, in id order.
    pub fn records_in(&self, collection: &str) -> StoreResult<Vec<Record>> {
        let mut records = Vec::new();
        for entry in self.store.scan(&keys::collection_prefix(collection))? {
            let (key, bytes) = entry?;
            records.push(decode(&key, &bytes)?);
        }
        Ok(records)
    }

    /// The highest `last_modified_at` across all persisted records.
    ///
    /// Used to seed the mutation clock after a restart.
    pub fn latest_timestamp(&self) -> StoreResult<Timestamp> {
        let mut latest = 0;
        for entry in self.store.scan(keys::RECORD_PREFIX)? {
            let (key, bytes) = entry?;
            let record: Record = decode(&key, &bytes)?;
            latest = latest.max(record.last_modified_at);
        }
        Ok(latest)
    }

    // ------------------------------------------------------------------
    // Queue items
    // ------------------------------------------------------------------

    pub fn save_queue_item(&self, item: &QueueItem) -> StoreResult<()> {
        let key = keys::queue_key(&item.collection, &item.record_id);
        self.save(&key, item)
    }

    pub fn delete_queue_item(&self, collection: &str, id: &str) -> StoreResult<()> {
        self.store.delete(&keys::queue_key(collection, id))
    }

    /// All persisted queue items, in key order.
    pub fn all_queue_items(&self) -> StoreResult<Vec<QueueItem>> {
        let mut items = Vec::new();
        for entry in self.store.scan(keys::QUEUE_PREFIX)? {
            let (key, bytes) = entry?;
            items.push(decode(&key, &bytes)?);
        }
        Ok(items)
    }

    // ------------------------------------------------------------------
    // Content bundles
    // ------------------------------------------------------------------

    pub fn load_bundle(&self, content_key: &str) -> StoreResult<Option<ContentBundle>> {
        let key = keys::content_key(content_key);
        self.load(&key)
    }

    pub fn save_bundle(&self, bundle: &ContentBundle) -> StoreResult<()> {
        let key = keys::content_key(&bundle.content_key);
        self.save(&key, bundle)
    }

    // ------------------------------------------------------------------

    fn load<T: DeserializeOwned>(&self, key: &str) -> StoreResult<Option<T>> {
        match self.store.get(key)? {
            Some(bytes) => Ok(Some(decode(key, &bytes)?)),
            None => Ok(None),
        }
    }

    fn save<T: Serialize>(&self, key: &str, value: &T) -> StoreResult<()> {
        let bytes = serde_json::to_vec(value).map_err(|e| StoreError::Corrupt {
            key: key.to_string(),
            reason: e.to_string(),
        })?;
        self.store.put(key, &bytes)
    }
}

fn decode<T: DeserializeOwned>(key: &str, bytes: &[u8]) -> StoreResult<T> {
    serde_json::from_slice(bytes).map_err(|e| StoreError::Corrupt {
        key: key.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn catalog() -> Catalog {
        Catalog::new(Arc::new(MemoryStore::new()))
    }

    #[test]
    fn record_roundtrip() {
        let catalog = catalog();
        let record = Record::new("theme", "settings", b"dark".to_vec(), 1000);

        catalog.save_record(&record).unwrap();
        let loaded = catalog.load_record("settings", "theme").unwrap().unwrap();
        assert_eq!(loaded, record);

        catalog.delete_record("settings", "theme").unwrap();
        assert!(catalog.load_record("settings", "theme").unwrap().is_none());
    }

    #[test]
    fn records_in_collection_are_isolated() {
        let catalog = catalog();
        catalog
            .save_record(&Record::new("a", "settings", vec![], 1))
            .unwrap();
        catalog
            .save_record(&Record::new("b", "settings", vec![], 2))
            .unwrap();
        catalog
            .save_record(&Record::new("a", "streaks", vec![], 3))
            .unwrap();

        let settings = catalog.records_in("settings").unwrap();
        assert_eq!(settings.len(), 2);
        assert!(settings.iter().all(|r| r.collection == "settings"));
    }

    #[test]
    fn latest_timestamp_spans_collections() {
        let catalog = catalog();
        catalog
            .save_record(&Record::new("a", "settings", vec![], 500))
            .unwrap();
        catalog
            .save_record(&Record::new("b", "streaks", vec![], 9000))
            .unwrap();

        assert_eq!(catalog.latest_timestamp().unwrap(), 9000);
    }

    #[test]
    fn corrupt_entry_is_reported_with_its_key() {
        let store = Arc::new(MemoryStore::new());
        store.put("record:settings:theme", b"not json").unwrap();
        let catalog = Catalog::new(store);

        let err = catalog.load_record("settings", "theme").unwrap_err();
        match err {
            StoreError::Corrupt { key, .. } => assert_eq!(key, "record:settings:theme"),
            other => panic!("unexpected error: {other}"),
        }
    }
}
