//! Locked façade over the versioning engine.

use crate::config::Config;
use crate::engine::{Engine, VersionInfo};
use crate::error::{CoreError, CoreResult};
use crate::stats::VersioningStats;
use parking_lot::{Mutex, MutexGuard};
use tracing::warn;
use verso_storage::StorageBackend;

/// A keyed byte store that keeps a bounded history of every key.
///
/// `VersionedStore` owns its backend behind a single mutex. Every public
/// operation acquires it with the configured [`Config::lock_timeout`] and
/// fails with [`CoreError::Busy`] if it cannot, so concurrent callers
/// observe each operation as atomic with respect to the others.
///
/// # Example
///
/// ```rust
/// use verso_core::{Config, VersionedStore};
/// use verso_storage::InMemoryBackend;
///
/// let store = VersionedStore::new(InMemoryBackend::new(), Config::default().max_history(2));
/// for body in ["a", "b", "c", "d"] {
///     store.write("notes", body.as_bytes()).unwrap();
/// }
///
/// let versions: Vec<u32> = store
///     .list_versions("notes")
///     .unwrap()
///     .iter()
///     .map(|v| v.version)
///     .collect();
/// assert_eq!(versions, vec![4, 3, 2]);
/// ```
pub struct VersionedStore<B: StorageBackend> {
    backend: Mutex<B>,
    config: Config,
    stats: VersioningStats,
}

impl<B: StorageBackend> VersionedStore<B> {
    /// Creates a store over `backend`.
    pub fn new(backend: B, config: Config) -> Self {
        Self {
            backend: Mutex::new(backend),
            config,
            stats: VersioningStats::new(),
        }
    }

    /// Returns the store configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns versioning statistics.
    #[must_use]
    pub fn stats(&self) -> &VersioningStats {
        &self.stats
    }

    fn lock(&self) -> CoreResult<MutexGuard<'_, B>> {
        let timeout = self.config.lock_timeout;
        self.backend.try_lock_for(timeout).ok_or_else(|| {
            warn!(?timeout, "store lock not acquired in time");
            CoreError::Busy { timeout }
        })
    }

    fn with_engine<R>(
        &self,
        op: impl FnOnce(&mut Engine<'_, B>) -> CoreResult<R>,
    ) -> CoreResult<R> {
        let mut backend = self.lock()?;
        let mut engine = Engine {
            backend: &mut *backend,
            config: &self.config,
            stats: &self.stats,
        };
        op(&mut engine)
    }

    /// Runs `f` with exclusive access to the backend.
    ///
    /// Writes made through this bypass versioning.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Busy`] if the lock is not acquired in time.
    pub fn with_backend<R>(&self, f: impl FnOnce(&mut B) -> R) -> CoreResult<R> {
        let mut backend = self.lock()?;
        Ok(f(&mut backend))
    }

    /// Consumes the store and returns the backend.
    pub fn into_inner(self) -> B {
        self.backend.into_inner()
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Writes `data` as the new content of `key` and returns its version.
    ///
    /// The content being replaced is archived first. Under
    /// [`crate::ArchivePolicy::BestEffort`] a failed archive is logged and the
    /// write goes ahead; under [`crate::ArchivePolicy::FailClosed`] the write
    /// is refused with [`CoreError::ArchiveFailed`].
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::BackendUnavailable`] if the backend is unmounted,
    /// [`CoreError::InvalidKey`] for reserved or malformed keys, and
    /// [`CoreError::Storage`] if the content or metadata cannot be written.
    pub fn write(&self, key: &str, data: &[u8]) -> CoreResult<u32> {
        self.with_engine(|engine| engine.write(key, data))
    }

    /// Archives the current content of `key` and records the version `data`
    /// will have, without writing `data` itself.
    ///
    /// For callers that write the canonical resource through their own path.
    /// Returns the version the pending write will carry.
    ///
    /// # Errors
    ///
    /// Same as [`VersionedStore::write`].
    pub fn on_before_write(&self, key: &str, data: &[u8]) -> CoreResult<u32> {
        self.with_engine(|engine| engine.on_before_write(key, data))
    }

    /// Snapshots the current content of `key` without writing anything new.
    ///
    /// Returns the archived version, or `0` when the content has no version
    /// yet; such content is kept unindexed and takes no version number.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::KeyNotFound`] if `key` has no content.
    pub fn archive_current(&self, key: &str) -> CoreResult<u32> {
        self.with_engine(|engine| engine.archive_current(key))
    }

    /// Makes the content of retained `version` current again.
    ///
    /// This is a forward copy, not a rollback: the old bytes are written as a
    /// new version, and the content they replace is archived like any other
    /// write. Returns the new version.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::VersionNotFound`] if `version` is not retained.
    pub fn restore(&self, key: &str, version: u32) -> CoreResult<u32> {
        self.with_engine(|engine| engine.restore(key, version))
    }

    /// Removes `key`, its metadata and every snapshot of it.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::KeyNotFound`] if `key` has no content.
    pub fn erase(&self, key: &str) -> CoreResult<()> {
        self.with_engine(|engine| engine.erase(key))
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Reads the current content of `key`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::KeyNotFound`] if `key` has no content.
    pub fn read(&self, key: &str) -> CoreResult<Vec<u8>> {
        self.with_engine(|engine| engine.read(key))
    }

    /// Returns true if `key` has content.
    pub fn exists(&self, key: &str) -> CoreResult<bool> {
        self.with_engine(|engine| engine.exists(key))
    }

    /// Returns the current version of `key`, or `0` if it has no content.
    pub fn get_version(&self, key: &str) -> CoreResult<u32> {
        self.with_engine(|engine| engine.get_version(key))
    }

    /// Describes the current version of `key`, or `None` if it has no
    /// content.
    pub fn get_version_info(&self, key: &str) -> CoreResult<Option<VersionInfo>> {
        self.with_engine(|engine| engine.get_version_info(key))
    }

    /// Lists the current version and every readable snapshot of `key`,
    /// newest first. Empty if `key` has no content.
    pub fn list_versions(&self, key: &str) -> CoreResult<Vec<VersionInfo>> {
        self.with_engine(|engine| engine.list_versions(key))
    }

    /// Reads the content of `version` of `key`.
    ///
    /// Version `0` and the current version read the canonical resource.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::VersionNotFound`] if `version` is neither current
    /// nor retained.
    pub fn read_version(&self, key: &str, version: u32) -> CoreResult<Vec<u8>> {
        self.with_engine(|engine| engine.read_version(key, version))
    }

    /// Fills `buf` with the leading bytes of `version` of `key`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::SizeMismatch`] if `buf` is longer than the
    /// content, and the errors of [`VersionedStore::read_version`].
    pub fn read_version_into(&self, key: &str, version: u32, buf: &mut [u8]) -> CoreResult<()> {
        self.with_engine(|engine| engine.read_version_into(key, version, buf))
    }

    /// Returns true if `key` has been written since `last_known_version`.
    pub fn has_changed(&self, key: &str, last_known_version: u32) -> CoreResult<bool> {
        self.with_engine(|engine| engine.has_changed(key, last_known_version))
    }

    // ========================================================================
    // Maintenance
    // ========================================================================

    /// Evicts snapshots of `key` until its history fits `max_history`.
    ///
    /// Only needed after lowering `max_history`; writes never let a history
    /// grow past it. Returns the number of evicted snapshots.
    pub fn cleanup_old_versions(&self, key: &str) -> CoreResult<u32> {
        self.with_engine(|engine| engine.cleanup_old_versions(key))
    }

    /// Runs [`VersionedStore::cleanup_old_versions`] for every key with
    /// metadata. Keys that fail are logged and skipped.
    pub fn cleanup_all(&self) -> CoreResult<u32> {
        self.with_engine(|engine| engine.cleanup_all())
    }

    /// Deletes snapshots of `key` that its metadata no longer indexes.
    ///
    /// Returns the number of deleted snapshots.
    pub fn purge_orphans(&self, key: &str) -> CoreResult<u32> {
        self.with_engine(|engine| engine.purge_orphans(key))
    }
}

impl<B: StorageBackend> std::fmt::Debug for VersionedStore<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VersionedStore")
            .field("config", &self.config)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}
