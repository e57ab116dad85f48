//! # Tether Engine
//!
//! The deterministic core of a local-first sync system.
//!
//! This crate provides the data model and decision logic for offline-first
//! synchronization: record versioning, write-ahead queue bookkeeping,
//! retry/backoff math, last-writer-wins conflict resolution, and content
//! staleness rules. The async runtime (`tether-runtime`) drives this logic
//! against real storage and real remotes.
//!
//! ## Design Principles
//!
//! - **No IO**: Engine has no knowledge of files, network, or platform
//! - **No clocks**: All time is passed in; same inputs always produce same outputs
//! - **Testable**: Pure logic, no mocks needed
//! - **Portable**: Runs anywhere Rust runs
//!
//! ## Core Concepts
//!
//! ### Records
//!
//! A [`Record`] is a logical unit of synchronizable state: an opaque payload
//! plus version bookkeeping (`local_version`, `remote_version`) and a
//! [`SyncState`] describing where it stands relative to the remote mirror.
//! Local storage is authoritative; the remote is an optional mirror.
//!
//! ### Queue items
//!
//! Every local mutation that takes a record out of `clean` state produces a
//! [`QueueItem`] — a durable intent to propagate that mutation. A newer
//! mutation to the same record coalesces into the existing item instead of
//! creating a duplicate.
//!
//! ### Conflict resolution
//!
//! [`resolve`](resolve::resolve) reconciles a local record with the remote
//! copy of the same record: last writer wins by logical timestamp, with
//! deterministic tie-breaks. No field-level merge.
//!
//! ### Backoff
//!
//! [`RetryPolicy`] computes exponential, capped, jittered retry delays. The
//! jitter input is injected by the caller so the math stays deterministic.
//!
//! ### Content bundles
//!
//! A [`ContentBundle`] is a cached snapshot of versioned remote content with
//! TTL-based staleness. Bundles are never evicted for staleness alone — only
//! superseded by a different revision.

pub mod backoff;
pub mod clock;
pub mod content;
pub mod error;
pub mod keys;
pub mod queue;
pub mod record;
pub mod resolve;

// Re-export main types at crate root
pub use backoff::RetryPolicy;
pub use clock::MutationClock;
pub use content::{ContentBundle, Freshness};
pub use error::Error;
pub use queue::{FailureKind, MutationKind, QueueItem};
pub use record::{Record, SyncState};
pub use resolve::{resolve, Resolution, Resolved};

/// Type aliases for clarity
pub type RecordId = String;
pub type CollectionName = String;
pub type ContentKey = String;
pub type Version = u64;
pub type Timestamp = u64;
