//! Durable key-addressed persistence.
//!
//! The local store is the only component that owns durable bytes; records,
//! queue items, and content bundles are all independent entries in one
//! keyspace, so a single durability mechanism governs crash recovery.

pub mod fs;
pub mod memory;

pub use fs::FsStore;
pub use memory::MemoryStore;

use crate::error::StoreResult;

/// Lazy, restartable scan over `(key, value)` entries, ordered by key.
pub type ScanIter = Box<dyn Iterator<Item = StoreResult<(String, Vec<u8>)>> + Send>;

/// Durable key-addressed persistence for serialized records.
///
/// Writes are synchronous from the caller's perspective and fail only on
/// local I/O errors, never on network state. Each key is written atomically:
/// a reader never observes a partially written value. No cross-key
/// transactions.
pub trait LocalStore: Send + Sync {
    /// Durably store `bytes` under `key`, replacing any previous value.
    fn put(&self, key: &str, bytes: &[u8]) -> StoreResult<()>;

    /// Fetch the value stored under `key`.
    fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Remove the value stored under `key`. Removing an absent key is not an
    /// error.
    fn delete(&self, key: &str) -> StoreResult<()>;

    /// Iterate all entries whose key starts with `prefix`, in key order.
    fn scan(&self, prefix: &str) -> StoreResult<ScanIter>;
}
