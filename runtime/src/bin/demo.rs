//! Tether demo - one offline-to-online sync round against an in-memory
//! backend.
//!
//! Writes a record while the remote is gated off, then flips the gate and
//! watches the worker drain the queue.

use std::sync::Arc;

use tether_engine::SyncState;
use tether_runtime::remote::MemoryBackend;
use tether_runtime::{Config, MemoryStore, RuntimeFlag, SyncEvent, SyncService};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tether_runtime=debug,tether_demo=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    tracing::info!("Starting Tether demo");

    let backend = MemoryBackend::shared();
    let flag = RuntimeFlag::shared(false);
    let service = SyncService::new(
        Arc::new(MemoryStore::new()),
        backend.clone(),
        backend.clone(),
        flag.clone(),
        None,
        config,
    )?;

    let mut events = service.events();

    // Write while the remote is gated off: local storage is authoritative
    // and the write succeeds instantly.
    service.put("settings", "theme", br#"{"mode":"dark"}"#.to_vec())?;
    tracing::info!(
        pending = service.queue().pending_len(),
        "wrote record while offline"
    );

    // Publish some remote content and read it through the cache.
    backend.put_content("lessons/intro", "rev-1", b"welcome".to_vec());
    tracing::info!(result = ?service.content("lessons/intro")?, "content before refresh");

    // Flip the gate; the worker drains on its next wake.
    flag.set(true);
    service.wake();

    while let Ok(event) = events.recv().await {
        tracing::info!(?event, "event");
        if matches!(
            event,
            SyncEvent::SyncStateChanged {
                state: SyncState::Clean,
                ..
            }
        ) {
            break;
        }
    }

    let mirrored = backend.record("settings", "theme");
    tracing::info!(
        version = ?mirrored.map(|r| r.local_version),
        "remote mirror updated"
    );

    // The cache now schedules a refresh and serves it on the next read.
    let _ = service.content("lessons/intro")?;

    service.shutdown().await;
    Ok(())
}
