//! Wall-clock access, kept out of the engine.

use std::time::{SystemTime, UNIX_EPOCH};
use tether_engine::Timestamp;

/// Current wall time as milliseconds since the Unix epoch.
pub fn now_ms() -> Timestamp {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as Timestamp)
        .unwrap_or(0)
}
