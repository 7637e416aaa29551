//! Error types for Verso core.

use std::time::Duration;
use thiserror::Error;
use verso_storage::StorageError;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in versioning operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The storage backend is not mounted.
    #[error("storage backend unavailable: not mounted")]
    BackendUnavailable,

    /// The store lock could not be acquired in time.
    #[error("store busy: lock not acquired within {timeout:?}")]
    Busy {
        /// The configured lock timeout.
        timeout: Duration,
    },

    /// No canonical resource exists for the key.
    #[error("key not found: {key}")]
    KeyNotFound {
        /// The requested key.
        key: String,
    },

    /// The requested version is not retained for the key.
    #[error("version {version} of {key} not found")]
    VersionNotFound {
        /// The requested key.
        key: String,
        /// The requested version.
        version: u32,
    },

    /// Caller buffer length disagrees with the stored content length.
    #[error("size mismatch: buffer holds {expected} bytes, content has {actual}")]
    SizeMismatch {
        /// Length of the caller's buffer.
        expected: u64,
        /// Length of the stored content.
        actual: u64,
    },

    /// The metadata sidecar could not be decoded.
    #[error("corrupt metadata for {key}: {message}")]
    CorruptMetadata {
        /// The key whose sidecar is corrupt.
        key: String,
        /// Description of the corruption.
        message: String,
    },

    /// Archiving the current content failed and the write was refused.
    #[error("archiving {key} failed: {message}")]
    ArchiveFailed {
        /// The key being written.
        key: String,
        /// Description of the failure.
        message: String,
    },

    /// The version counter of the key is exhausted.
    #[error("version counter of {key} exhausted")]
    VersionOverflow {
        /// The key being written.
        key: String,
    },

    /// The key collides with a name reserved for versioning resources.
    #[error("invalid key {key:?}: {reason}")]
    InvalidKey {
        /// The rejected key.
        key: String,
        /// Why the key was rejected.
        reason: String,
    },

    /// Underlying read/write/delete failure.
    #[error("storage error: {0}")]
    Storage(StorageError),
}

impl From<StorageError> for CoreError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Unmounted => Self::BackendUnavailable,
            StorageError::InvalidKey { key, reason } => Self::InvalidKey {
                key,
                reason: reason.to_string(),
            },
            other => Self::Storage(other),
        }
    }
}

impl CoreError {
    /// Creates a key not found error.
    pub fn key_not_found(key: impl Into<String>) -> Self {
        Self::KeyNotFound { key: key.into() }
    }

    /// Creates a version not found error.
    pub fn version_not_found(key: impl Into<String>, version: u32) -> Self {
        Self::VersionNotFound {
            key: key.into(),
            version,
        }
    }

    /// Creates a corrupt metadata error.
    pub fn corrupt_metadata(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CorruptMetadata {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Creates an archive failed error.
    pub fn archive_failed(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ArchiveFailed {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Creates an invalid key error.
    pub fn invalid_key(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidKey {
            key: key.into(),
            reason: reason.into(),
        }
    }
}
