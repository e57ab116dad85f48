//! Filesystem-backed store: one file per key.
//!
//! Keys are hex-encoded into filenames, which preserves both ordering and
//! prefixes, so scans are a directory listing plus a sort. Writes go through
//! a temp file, fsync, and an atomic rename; concurrent writers to the same
//! key serialize on a per-key lock while different keys proceed
//! independently.

use std::io::{ErrorKind, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use dashmap::DashMap;
use tempfile::NamedTempFile;

use super::{LocalStore, ScanIter};
use crate::error::{StoreError, StoreResult};

/// Directory-backed [`LocalStore`].
pub struct FsStore {
    root: PathBuf,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl FsStore {
    /// Open a store rooted at `root`, creating the directory if needed.
    pub fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            locks: DashMap::new(),
        })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(hex::encode(key))
    }

    fn lock_for(&self, key: &str) -> Arc<Mutex<()>> {
        self.locks.entry(key.to_string()).or_default().clone()
    }
}

impl LocalStore for FsStore {
    fn put(&self, key: &str, bytes: &[u8]) -> StoreResult<()> {
        let lock = self.lock_for(key);
        let _guard = lock.lock().expect("per-key lock poisoned");

        let mut tmp = NamedTempFile::new_in(&self.root)?;
        tmp.write_all(bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(self.path_for(key)).map_err(|e| e.error)?;
        Ok(())
    }

    fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        match std::fs::read(self.path_for(key)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    fn delete(&self, key: &str) -> StoreResult<()> {
        let lock = self.lock_for(key);
        let _guard = lock.lock().expect("per-key lock poisoned");

        match std::fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    fn scan(&self, prefix: &str) -> StoreResult<ScanIter> {
        let mut keys = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let name = entry?.file_name();
            let Some(name) = name.to_str() else { continue };
            // Skip temp files and anything else that isn't a hex-coded key
            let Ok(raw) = hex::decode(name) else { continue };
            let Ok(key) = String::from_utf8(raw) else { continue };
            if key.starts_with(prefix) {
                keys.push(key);
            }
        }
        keys.sort();

        let root = self.root.clone();
        Ok(Box::new(keys.into_iter().filter_map(move |key| {
            match std::fs::read(root.join(hex::encode(&key))) {
                Ok(bytes) => Some(Ok((key, bytes))),
                // Deleted between listing and read: skip
                Err(e) if e.kind() == ErrorKind::NotFound => None,
                Err(e) => Some(Err(StoreError::Io(e))),
            }
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_temp() -> (tempfile::TempDir, FsStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::open(dir.path()).unwrap();
        (dir, store)
    }

    #[test]
    fn put_get_delete_roundtrip() {
        let (_dir, store) = open_temp();

        store.put("record:settings:theme", b"dark").unwrap();
        assert_eq!(
            store.get("record:settings:theme").unwrap(),
            Some(b"dark".to_vec())
        );

        store.delete("record:settings:theme").unwrap();
        assert_eq!(store.get("record:settings:theme").unwrap(), None);
    }

    #[test]
    fn delete_of_absent_key_is_ok() {
        let (_dir, store) = open_temp();
        store.delete("record:settings:missing").unwrap();
    }

    #[test]
    fn put_replaces_existing_value() {
        let (_dir, store) = open_temp();
        store.put("k", b"one").unwrap();
        store.put("k", b"two").unwrap();
        assert_eq!(store.get("k").unwrap(), Some(b"two".to_vec()));
    }

    #[test]
    fn scan_is_prefix_filtered_and_ordered() {
        let (_dir, store) = open_temp();
        store.put("queue:settings:b", b"2").unwrap();
        store.put("queue:settings:a", b"1").unwrap();
        store.put("record:settings:a", b"x").unwrap();

        let entries: Vec<_> = store
            .scan("queue:")
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].0, "queue:settings:a");
        assert_eq!(entries[1].0, "queue:settings:b");
    }

    #[test]
    fn scan_is_restartable() {
        let (_dir, store) = open_temp();
        store.put("content:a", b"1").unwrap();

        let first: Vec<_> = store.scan("content:").unwrap().collect();
        let second: Vec<_> = store.scan("content:").unwrap().collect();
        assert_eq!(first.len(), second.len());
    }

    #[test]
    fn values_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = FsStore::open(dir.path()).unwrap();
            store.put("record:streaks:me", b"7").unwrap();
        }
        let store = FsStore::open(dir.path()).unwrap();
        assert_eq!(store.get("record:streaks:me").unwrap(), Some(b"7".to_vec()));
    }

    #[test]
    fn keys_with_unicode_and_separators() {
        let (_dir, store) = open_temp();
        let key = "content:lessons/日本語:intro";
        store.put(key, b"v").unwrap();
        assert_eq!(store.get(key).unwrap(), Some(b"v".to_vec()));

        let entries: Vec<_> = store
            .scan("content:")
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        assert_eq!(entries[0].0, key);
    }
}
