//! Configuration management for the runtime.

use std::env;
use std::path::PathBuf;
use tether_engine::RetryPolicy;

/// Runtime configuration loaded from environment variables.
///
/// The remote-sync enablement flag is deliberately not part of this struct:
/// the [`crate::gate::FeatureGate`] re-reads its flag source on every check
/// so runtime toggles take effect immediately.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory for the file-backed store
    pub data_dir: PathBuf,
    /// Idle poll interval for the sync worker, in milliseconds
    pub poll_interval_ms: u64,
    /// Timeout applied to every remote call, in milliseconds
    pub remote_timeout_ms: u64,
    /// Retry, backoff, and dead-letter parameters for the sync queue
    pub retry: RetryPolicy,
    /// Default TTL for cached content bundles, in milliseconds
    pub content_ttl_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./tether-data"),
            poll_interval_ms: 30_000,
            remote_timeout_ms: 10_000,
            retry: RetryPolicy::default(),
            content_ttl_ms: 15 * 60 * 1_000,
        }
    }
}

impl Config {
    /// Load configuration from environment variables, falling back to
    /// defaults for anything unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let data_dir = env::var("TETHER_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.data_dir);

        let poll_interval_ms = parse_var("TETHER_POLL_INTERVAL_MS", defaults.poll_interval_ms)?;
        let remote_timeout_ms = parse_var("TETHER_REMOTE_TIMEOUT_MS", defaults.remote_timeout_ms)?;
        let content_ttl_ms = parse_var("TETHER_CONTENT_TTL_MS", defaults.content_ttl_ms)?;

        let retry = RetryPolicy {
            base_delay_ms: parse_var("TETHER_RETRY_BASE_MS", defaults.retry.base_delay_ms)?,
            max_delay_ms: parse_var("TETHER_RETRY_MAX_MS", defaults.retry.max_delay_ms)?,
            max_attempts: parse_var("TETHER_MAX_ATTEMPTS", defaults.retry.max_attempts)?,
            jitter_ratio: defaults.retry.jitter_ratio,
        };

        Ok(Self {
            data_dir,
            poll_interval_ms,
            remote_timeout_ms,
            retry,
            content_ttl_ms,
        })
    }
}

fn parse_var<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue(name)),
        Err(_) => Ok(default),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {0}")]
    InvalidValue(&'static str),
}
