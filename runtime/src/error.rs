//! Error types for the Tether runtime.
//!
//! Local store errors propagate synchronously to the caller of the
//! triggering write. Remote errors carry their retry classification and
//! reach callers only through the asynchronous event surface.

use tether_engine::FailureKind;
use thiserror::Error;

/// Errors from the durable local store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("local I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt entry at {key}: {reason}")]
    Corrupt { key: String, reason: String },

    #[error(transparent)]
    Key(#[from] tether_engine::Error),
}

/// Result type for store-backed operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// A classified failure from a remote adapter.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// Network/timeout/server error — retried with backoff
    #[error("transient remote error: {0}")]
    Transient(String),

    /// Validation/authorization error — surfaced immediately, never retried
    #[error("permanent remote error: {0}")]
    Permanent(String),
}

impl RemoteError {
    /// The queue-item classification for this failure.
    pub fn classification(&self) -> FailureKind {
        match self {
            RemoteError::Transient(_) => FailureKind::Transient,
            RemoteError::Permanent(_) => FailureKind::Permanent,
        }
    }

    /// The human-readable reason.
    pub fn reason(&self) -> &str {
        match self {
            RemoteError::Transient(reason) | RemoteError::Permanent(reason) => reason,
        }
    }
}
