//! Error types for the Tether engine.

use thiserror::Error;

/// All possible errors from the Tether engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("invalid collection name: {0}")]
    InvalidCollection(String),
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
