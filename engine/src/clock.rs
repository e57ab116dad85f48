//! Monotonic logical timestamps for local mutations.
//!
//! Last-writer-wins resolution depends on `last_modified_at` stamps that
//! never repeat and never move backwards, even when the wall clock does.
//! The wall time is injected, so the clock itself stays deterministic.

use crate::Timestamp;

/// Issues strictly increasing millisecond timestamps.
///
/// Each call to [`stamp`](MutationClock::stamp) returns the wall time if it
/// has advanced past the previous stamp, otherwise previous + 1.
#[derive(Debug, Clone, Default)]
pub struct MutationClock {
    last: Timestamp,
}

impl MutationClock {
    /// Create a clock with no history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a clock that will never stamp at or below `floor`.
    ///
    /// Used after restart, seeded with the highest persisted timestamp.
    pub fn with_floor(floor: Timestamp) -> Self {
        Self { last: floor }
    }

    /// Issue the next stamp given the current wall time in milliseconds.
    pub fn stamp(&mut self, wall_ms: Timestamp) -> Timestamp {
        self.last = wall_ms.max(self.last + 1);
        self.last
    }

    /// The most recently issued stamp, or the floor if none was issued.
    pub fn last(&self) -> Timestamp {
        self.last
    }
}
