//! Error types for the cache
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the cache.
#[derive(Error, Debug)]
pub enum CacheError {
    /// The underlying SQLite table rejected a statement or failed on I/O
    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// The value could not be turned into its stored text form
    #[error("Failed to encode value for key '{key}': {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// The stored text does not match the requested type
    #[error("Failed to decode value for key '{key}': {source}")]
    Decode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

impl CacheError {
    /// Returns true for errors raised by the storage layer.
    pub fn is_storage(&self) -> bool {
        matches!(self, CacheError::Storage(_))
    }
}

// == Result Type Alias ==
/// Convenience Result type for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;
