//! Error types for storage operations.

use std::io;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The backend is not mounted.
    #[error("storage is not mounted")]
    Unmounted,

    /// No resource is stored under the key.
    #[error("no resource stored under key: {key}")]
    NotFound {
        /// The requested key.
        key: String,
    },

    /// The resource holds fewer bytes than were requested.
    #[error("short read on {key}: requested {requested} bytes, {available} available")]
    ShortRead {
        /// The requested key.
        key: String,
        /// Number of bytes requested.
        requested: usize,
        /// Number of bytes actually stored.
        available: u64,
    },

    /// The key is not a valid resource name.
    #[error("invalid key {key:?}: {reason}")]
    InvalidKey {
        /// The rejected key.
        key: String,
        /// Why the key was rejected.
        reason: &'static str,
    },
}

impl StorageError {
    /// Creates a not-found error.
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound { key: key.into() }
    }

    /// Creates an invalid key error.
    pub fn invalid_key(key: impl Into<String>, reason: &'static str) -> Self {
        Self::InvalidKey {
            key: key.into(),
            reason,
        }
    }

    /// Returns true if this error reports a missing resource.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound { .. } => true,
            Self::Io(err) => err.kind() == io::ErrorKind::NotFound,
            _ => false,
        }
    }
}
