//! Cached snapshots of versioned remote content.
//!
//! A bundle is served from local storage immediately and revalidated in the
//! background when stale. Staleness makes a bundle eligible for refresh; it
//! never causes eviction. Only a different remote revision replaces a bundle.

use crate::{ContentKey, Timestamp};
use serde::{Deserialize, Serialize};

/// How current a served bundle is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Freshness {
    /// Within its TTL
    Fresh,
    /// Past its TTL, a background refresh is possible
    Stale,
    /// Past its TTL and the remote is unreachable or gated off
    OfflineFallback,
}

/// A cached snapshot of remote, read-mostly content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentBundle {
    /// Key identifying the content on the remote
    pub content_key: ContentKey,
    /// Remote revision identifier this bundle was fetched at
    pub content_hash: String,
    /// When the bundle was fetched or last revalidated (milliseconds)
    pub fetched_at: Timestamp,
    /// Maximum age before the bundle is eligible for refresh
    pub ttl_ms: u64,
    /// The content itself
    pub payload: Vec<u8>,
}

impl ContentBundle {
    /// Create a bundle from a successful fetch.
    pub fn new(
        content_key: impl Into<ContentKey>,
        content_hash: impl Into<String>,
        payload: Vec<u8>,
        now: Timestamp,
        ttl_ms: u64,
    ) -> Self {
        Self {
            content_key: content_key.into(),
            content_hash: content_hash.into(),
            fetched_at: now,
            ttl_ms,
            payload,
        }
    }

    /// Whether the bundle is past its TTL at `now`.
    pub fn is_stale(&self, now: Timestamp) -> bool {
        now >= self.fetched_at.saturating_add(self.ttl_ms)
    }

    /// Freshness of this bundle as served to a caller at `now`.
    pub fn freshness(&self, now: Timestamp, remote_allowed: bool) -> Freshness {
        if !self.is_stale(now) {
            Freshness::Fresh
        } else if remote_allowed {
            Freshness::Stale
        } else {
            Freshness::OfflineFallback
        }
    }

    /// Whether a fetched revision supersedes this bundle.
    pub fn superseded_by(&self, revision: &str) -> bool {
        self.content_hash != revision
    }

    /// Extend the bundle's life after the remote confirmed it is unchanged.
    pub fn revalidated(&mut self, now: Timestamp) {
        self.fetched_at = now;
    }
}
