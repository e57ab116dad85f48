//! Retry policy: exponential backoff with a cap and bounded jitter.
//!
//! The jitter input is a unit value in `[-1, 1]` supplied by the caller
//! (the runtime draws it from a real RNG), so every delay the policy
//! computes is reproducible from its inputs.

use serde::{Deserialize, Serialize};

/// Backoff and dead-letter parameters for the sync queue.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryPolicy {
    /// Delay before the first retry, in milliseconds
    pub base_delay_ms: u64,
    /// Upper bound on any single delay, in milliseconds
    pub max_delay_ms: u64,
    /// Attempts after which an item is dead-lettered
    pub max_attempts: u32,
    /// Fraction of the delay the jitter may add or remove
    pub jitter_ratio: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay_ms: 1_000,
            max_delay_ms: 5 * 60 * 1_000,
            max_attempts: 8,
            jitter_ratio: 0.2,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based), without jitter.
    ///
    /// Doubles per attempt, capped at `max_delay_ms`.
    pub fn raw_delay_ms(&self, attempt: u32) -> u64 {
        let exp = attempt.saturating_sub(1).min(32);
        self.base_delay_ms
            .saturating_mul(1u64 << exp)
            .min(self.max_delay_ms)
    }

    /// Delay before retry number `attempt`, with `jitter` in `[-1, 1]`
    /// scaled by `jitter_ratio`.
    pub fn delay_ms(&self, attempt: u32, jitter: f64) -> u64 {
        let raw = self.raw_delay_ms(attempt) as f64;
        (raw * (1.0 + self.jitter_ratio * jitter.clamp(-1.0, 1.0))).max(0.0) as u64
    }

    /// Whether an item with this many attempts is past retrying.
    pub fn exhausted(&self, attempt_count: u32) -> bool {
        attempt_count > self.max_attempts
    }
}
