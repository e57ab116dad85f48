//! The persisted key namespace.
//!
//! Every durable object is an independent store entry under a namespaced
//! string key:
//!
//! - `record:{collection}:{id}`
//! - `queue:{collection}:{id}`
//! - `content:{key}`
//!
//! Queue items are keyed by the record's coordinates, which makes the
//! one-item-per-record invariant a property of the keyspace itself.
//! Collection names must not contain `:`; ids and content keys may.

use crate::error::{Error, Result};

/// Prefix for record entries.
pub const RECORD_PREFIX: &str = "record:";
/// Prefix for sync queue entries.
pub const QUEUE_PREFIX: &str = "queue:";
/// Prefix for content bundle entries.
pub const CONTENT_PREFIX: &str = "content:";

/// Reject collection names that would corrupt the namespace.
pub fn validate_collection(collection: &str) -> Result<()> {
    if collection.is_empty() || collection.contains(':') {
        return Err(Error::InvalidCollection(collection.to_string()));
    }
    Ok(())
}

/// Store key for a record.
pub fn record_key(collection: &str, id: &str) -> String {
    format!("{RECORD_PREFIX}{collection}:{id}")
}

/// Store key for a record's queue item.
pub fn queue_key(collection: &str, id: &str) -> String {
    format!("{QUEUE_PREFIX}{collection}:{id}")
}

/// Store key for a content bundle.
pub fn content_key(key: &str) -> String {
    format!("{CONTENT_PREFIX}{key}")
}

/// Scan prefix for all records in one collection.
pub fn collection_prefix(collection: &str) -> String {
    format!("{RECORD_PREFIX}{collection}:")
}

/// Split a `record:` key into `(collection, id)`.
pub fn parse_record_key(key: &str) -> Result<(String, String)> {
    parse_namespaced(key, RECORD_PREFIX)
}

/// Split a `queue:` key into `(collection, id)`.
pub fn parse_queue_key(key: &str) -> Result<(String, String)> {
    parse_namespaced(key, QUEUE_PREFIX)
}

/// Extract the content key from a `content:` store key.
pub fn parse_content_key(key: &str) -> Result<String> {
    key.strip_prefix(CONTENT_PREFIX)
        .filter(|rest| !rest.is_empty())
        .map(str::to_string)
        .ok_or_else(|| Error::InvalidKey(key.to_string()))
}

fn parse_namespaced(key: &str, prefix: &str) -> Result<(String, String)> {
    let rest = key
        .strip_prefix(prefix)
        .ok_or_else(|| Error::InvalidKey(key.to_string()))?;
    match rest.split_once(':') {
        Some((collection, id)) if !collection.is_empty() && !id.is_empty() => {
            Ok((collection.to_string(), id.to_string()))
        }
        _ => Err(Error::InvalidKey(key.to_string())),
    }
}
