//! In-memory store for tests and remote-less demos.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Mutex;

use super::{LocalStore, ScanIter};
use crate::error::StoreResult;

/// [`LocalStore`] backed by a `BTreeMap`; scans are ordered for free.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl LocalStore for MemoryStore {
    fn put(&self, key: &str, bytes: &[u8]) -> StoreResult<()> {
        self.entries
            .lock()
            .expect("store lock poisoned")
            .insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        Ok(self
            .entries
            .lock()
            .expect("store lock poisoned")
            .get(key)
            .cloned())
    }

    fn delete(&self, key: &str) -> StoreResult<()> {
        self.entries
            .lock()
            .expect("store lock poisoned")
            .remove(key);
        Ok(())
    }

    fn scan(&self, prefix: &str) -> StoreResult<ScanIter> {
        let entries = self.entries.lock().expect("store lock poisoned");
        let matched: Vec<(String, Vec<u8>)> = entries
            .range::<String, _>((Bound::Included(prefix.to_string()), Bound::Unbounded))
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Ok(Box::new(matched.into_iter().map(Ok)))
    }
}
