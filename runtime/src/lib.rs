//! # Tether Runtime
//!
//! The async shell around [`tether_engine`]: durable local storage, a
//! durable write-ahead sync queue, a background worker that drains the queue
//! against a remote backend, and a cache-then-revalidate content fetcher.
//!
//! Local durable storage is the authoritative source of truth. The remote
//! backend is an optional, feature-gated mirror that never blocks and never
//! corrupts the local view:
//!
//! - Writes land in the [`store::LocalStore`] synchronously and never fail
//!   due to network state.
//! - Every mutation leaves a durable [`tether_engine::QueueItem`] that the
//!   [`worker::SyncWorker`] propagates with retry, backoff, and
//!   dead-lettering.
//! - Reads of remote content go through the [`content::ContentCache`], which
//!   serves the best local copy immediately and revalidates in the
//!   background.
//! - The [`gate::FeatureGate`] is the single authority on whether any remote
//!   operation is permitted.
//!
//! [`service::SyncService`] wires all of this together; components are
//! constructed once and passed by reference, never reached through globals.

pub mod config;
pub mod content;
pub mod error;
pub mod events;
pub mod gate;
pub mod queue;
pub mod records;
pub mod remote;
pub mod service;
pub mod store;
pub mod time;
pub mod worker;

pub use config::{Config, ConfigError};
pub use content::{ContentCache, ContentResult};
pub use error::{RemoteError, StoreError};
pub use events::{EventBus, SyncEvent};
pub use gate::{Connectivity, EnvFlag, FeatureGate, FlagSource, RuntimeFlag};
pub use queue::SyncQueue;
pub use records::Catalog;
pub use remote::{ContentBackend, PushOutcome, RecordBackend};
pub use service::SyncService;
pub use store::{FsStore, LocalStore, MemoryStore};
pub use worker::SyncWorker;
