//! Storage backend trait definition.

use crate::error::{StorageError, StorageResult};

/// A flat keyed byte store.
///
/// Storage backends are **opaque byte stores**. Each key names one resource
/// holding a byte blob that is always replaced as a whole. Backends do not
/// understand version metadata, snapshots, or sidecar naming.
///
/// # Invariants
///
/// - `write` replaces the whole resource in one step
/// - `read` returns exactly `len` bytes or fails
/// - `size` returns `0` for a missing resource as well as an empty one;
///   callers that care use `exists`
/// - Every operation except `is_mounted` and `full_path` fails with
///   [`StorageError::Unmounted`] (or reports absence) while unmounted
/// - Backends must be `Send + Sync` for concurrent access
///
/// # Implementors
///
/// - [`super::InMemoryBackend`] - For testing
/// - [`super::FileBackend`] - For persistent storage
pub trait StorageBackend: Send + Sync {
    /// Returns the backend-specific location a key maps to.
    ///
    /// For [`super::FileBackend`] this is the host path. Used for
    /// diagnostics only.
    fn full_path(&self, key: &str) -> String;

    /// Reads the first `len` bytes stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The backend is unmounted
    /// - The key is invalid or absent
    /// - Fewer than `len` bytes are stored ([`StorageError::ShortRead`])
    /// - An I/O error occurs
    fn read(&self, key: &str, len: usize) -> StorageResult<Vec<u8>>;

    /// Replaces the resource under `key` with `data`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend is unmounted, the key is invalid, or
    /// an I/O error occurs.
    fn write(&mut self, key: &str, data: &[u8]) -> StorageResult<()>;

    /// Removes the resource under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] if nothing is stored under `key`,
    /// or an error if the backend is unmounted or an I/O error occurs.
    fn delete(&mut self, key: &str) -> StorageResult<()>;

    /// Returns the size in bytes of the resource under `key`, `0` if absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend is unmounted or the size cannot be
    /// determined.
    fn size(&self, key: &str) -> StorageResult<u64>;

    /// Returns true if a resource is stored under `key`.
    ///
    /// Unmounted backends and invalid keys report `false`.
    fn exists(&self, key: &str) -> bool;

    /// Returns true if the backend is ready for I/O.
    fn is_mounted(&self) -> bool;

    /// Lists every stored key in ascending order.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend is unmounted or an I/O error occurs.
    fn list(&self) -> StorageResult<Vec<String>>;

    /// Reads the whole resource stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] if the key is absent, or any error
    /// `size` or `read` reports.
    fn read_all(&self, key: &str) -> StorageResult<Vec<u8>> {
        if !self.exists(key) {
            if !self.is_mounted() {
                return Err(StorageError::Unmounted);
            }
            return Err(StorageError::not_found(key));
        }
        let len = self.size(key)?;
        let len = usize::try_from(len).map_err(|_| StorageError::ShortRead {
            key: key.to_string(),
            requested: usize::MAX,
            available: len,
        })?;
        self.read(key, len)
    }
}
