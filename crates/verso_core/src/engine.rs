//! Versioning engine: archive-on-write, bounded eviction, restore.
//!
//! [`Engine`] borrows the backend for the span of one locked operation and
//! never locks anything itself. [`crate::VersionedStore`] owns the lock.

use crate::checksum::checksum;
use crate::config::{ArchivePolicy, Config, MetadataRecovery};
use crate::error::{CoreError, CoreResult};
use crate::history::HistoryFull;
use crate::metadata::{
    metadata_key, parse_snapshot_key, snapshot_key, unix_timestamp, validate_user_key,
    VersionMetadata, METADATA_SUFFIX,
};
use crate::stats::VersioningStats;
use tracing::{debug, error, info, warn};
use verso_storage::{normalize_key, StorageBackend, StorageError};

/// One entry of a key's version listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionInfo {
    /// Version number.
    pub version: u32,
    /// Content size in bytes.
    pub size: u64,
    /// Seconds since the Unix epoch of the write that produced the current
    /// version. Snapshots carry no timestamp.
    pub timestamp: Option<u32>,
    /// True for the current content, false for a retained snapshot.
    pub is_current: bool,
}

pub(crate) struct Engine<'a, B: StorageBackend> {
    pub(crate) backend: &'a mut B,
    pub(crate) config: &'a Config,
    pub(crate) stats: &'a VersioningStats,
}

impl<B: StorageBackend> Engine<'_, B> {
    fn ensure_mounted(&self) -> CoreResult<()> {
        if self.backend.is_mounted() {
            Ok(())
        } else {
            Err(CoreError::BackendUnavailable)
        }
    }

    fn ensure_ready(&self, key: &str) -> CoreResult<()> {
        self.ensure_mounted()?;
        validate_user_key(key)
    }

    // === Metadata ===

    fn load_metadata(&self, key: &str) -> CoreResult<VersionMetadata> {
        let max_history = self.config.max_history;
        let meta_key = metadata_key(key);
        if !self.backend.exists(&meta_key) {
            return Ok(VersionMetadata::new(max_history));
        }

        let loaded = self
            .backend
            .read_all(&meta_key)
            .map_err(CoreError::from)
            .and_then(|data| VersionMetadata::decode(key, &data, max_history));

        match (loaded, self.config.metadata_recovery) {
            (Ok(meta), _) => Ok(meta),
            (Err(CoreError::BackendUnavailable), _) => Err(CoreError::BackendUnavailable),
            (Err(err), MetadataRecovery::Reset) => {
                warn!(key, error = %err, "unusable version metadata, starting history afresh");
                self.stats.record_metadata_reset();
                Ok(VersionMetadata::new(max_history))
            }
            (Err(err), MetadataRecovery::Fail) => Err(err),
        }
    }

    fn save_metadata(&mut self, key: &str, meta: &VersionMetadata) -> CoreResult<()> {
        self.backend
            .write(&metadata_key(key), &meta.encode())
            .map_err(|err| {
                error!(key, error = %err, "failed to save version metadata");
                CoreError::from(err)
            })
    }

    // === Eviction ===

    /// Deletes the snapshot of `version` and drops it from the index.
    ///
    /// A snapshot that is already gone counts as evicted. Any other delete
    /// failure leaves the index unchanged.
    fn evict(&mut self, key: &str, meta: &mut VersionMetadata, version: u32) -> CoreResult<()> {
        match self.backend.delete(&snapshot_key(key, version)) {
            Ok(()) => {}
            Err(err) if err.is_not_found() => {
                debug!(key, version, "evicted snapshot was already missing");
            }
            Err(err) => {
                warn!(key, version, error = %err, "failed to evict snapshot");
                return Err(err.into());
            }
        }
        meta.history.remove(version);
        self.stats.record_eviction();
        debug!(key, version, "evicted old version");
        Ok(())
    }

    fn evict_oldest(&mut self, key: &str, meta: &mut VersionMetadata) -> CoreResult<bool> {
        match meta.history.oldest() {
            Some(oldest) => self.evict(key, meta, oldest).map(|()| true),
            None => Ok(false),
        }
    }

    // === Archive ===

    /// Copies the canonical content to the snapshot of
    /// `meta.current_version` and indexes it, evicting the oldest snapshots
    /// while the history is full. `meta` is not persisted.
    fn archive_into(&mut self, key: &str, meta: &mut VersionMetadata) -> CoreResult<()> {
        let version = meta.current_version;
        let content = self.backend.read_all(key).map_err(|err| {
            if err.is_not_found() {
                CoreError::key_not_found(key)
            } else {
                CoreError::from(err)
            }
        })?;
        self.backend.write(&snapshot_key(key, version), &content)?;

        loop {
            match meta.history.try_insert(version) {
                Ok(true) => {
                    self.stats.record_archive();
                    debug!(key, version, bytes = content.len(), "archived version");
                    return Ok(());
                }
                // Already indexed: the snapshot was refreshed in place.
                Ok(false) => return Ok(()),
                Err(HistoryFull { oldest }) => self.evict(key, meta, oldest)?,
            }
        }
    }

    /// Copies content that carries no version number, because it predates
    /// versioning or its metadata was reset, to the `.v0` snapshot. The copy
    /// is never indexed, so it takes no version number and `purge_orphans`
    /// removes it.
    fn preserve_unversioned(&mut self, key: &str) -> CoreResult<()> {
        let content = self.backend.read_all(key)?;
        self.backend.write(&snapshot_key(key, 0), &content)?;
        info!(key, bytes = content.len(), "preserved unversioned content");
        Ok(())
    }

    /// Saves the content about to be replaced: archived under its version,
    /// or preserved unindexed when it has none. `meta` is not persisted.
    fn save_outgoing(&mut self, key: &str, meta: &mut VersionMetadata) -> CoreResult<()> {
        if meta.current_version == 0 {
            self.preserve_unversioned(key)
        } else {
            self.archive_into(key, meta)
        }
    }

    pub(crate) fn archive_current(&mut self, key: &str) -> CoreResult<u32> {
        self.ensure_ready(key)?;
        if !self.backend.exists(key) {
            return Err(CoreError::key_not_found(key));
        }
        let mut meta = self.load_metadata(key)?;
        if meta.current_version == 0 {
            self.preserve_unversioned(key)?;
            return Ok(0);
        }
        self.archive_into(key, &mut meta)?;
        self.save_metadata(key, &meta)?;
        Ok(meta.current_version)
    }

    // === Write path ===

    /// Archives the content about to be replaced and describes `data` as the
    /// next version. Nothing is persisted.
    fn prepare_write(&mut self, key: &str, data: &[u8]) -> CoreResult<VersionMetadata> {
        let mut meta = self.load_metadata(key)?;

        if self.backend.exists(key) {
            // On failure `meta` still reflects any eviction that did happen.
            if let Err(err) = self.save_outgoing(key, &mut meta) {
                self.stats.record_archive_failure();
                match self.config.archive_policy {
                    ArchivePolicy::BestEffort => warn!(
                        key,
                        version = meta.current_version,
                        error = %err,
                        "failed to archive current version, writing anyway"
                    ),
                    ArchivePolicy::FailClosed => {
                        return Err(CoreError::archive_failed(key, err.to_string()));
                    }
                }
            }
        }

        meta.current_version = meta
            .current_version
            .checked_add(1)
            .ok_or_else(|| CoreError::VersionOverflow {
                key: key.to_string(),
            })?;
        meta.timestamp = unix_timestamp();
        meta.file_size = u32::try_from(data.len()).unwrap_or(u32::MAX);
        meta.checksum = checksum(data);
        Ok(meta)
    }

    pub(crate) fn on_before_write(&mut self, key: &str, data: &[u8]) -> CoreResult<u32> {
        self.ensure_ready(key)?;
        let meta = self.prepare_write(key, data)?;
        self.save_metadata(key, &meta)?;
        Ok(meta.current_version)
    }

    pub(crate) fn write(&mut self, key: &str, data: &[u8]) -> CoreResult<u32> {
        self.ensure_ready(key)?;
        let meta = self.prepare_write(key, data)?;

        self.backend.write(key, data).map_err(|err| {
            error!(key, error = %err, "failed to write content");
            CoreError::from(err)
        })?;
        self.save_metadata(key, &meta)?;

        self.stats.record_write(data.len() as u64);
        debug!(
            key,
            version = meta.current_version,
            bytes = data.len(),
            crc = meta.checksum,
            "wrote version"
        );
        Ok(meta.current_version)
    }

    pub(crate) fn restore(&mut self, key: &str, version: u32) -> CoreResult<u32> {
        self.ensure_ready(key)?;
        let meta = self.load_metadata(key)?;
        if !meta.history.contains(version) {
            return Err(CoreError::version_not_found(key, version));
        }

        let content = self
            .backend
            .read_all(&snapshot_key(key, version))
            .map_err(|err| {
                if err.is_not_found() {
                    CoreError::version_not_found(key, version)
                } else {
                    CoreError::from(err)
                }
            })?;

        // A restore is an ordinary write of old content: it produces a new
        // version rather than rewinding the counter.
        let new_version = self.write(key, &content)?;
        self.stats.record_restore();
        info!(key, version, new_version, "restored version");
        Ok(new_version)
    }

    // === Queries ===

    pub(crate) fn read(&self, key: &str) -> CoreResult<Vec<u8>> {
        self.ensure_ready(key)?;
        self.backend.read_all(key).map_err(|err| {
            if err.is_not_found() {
                CoreError::key_not_found(key)
            } else {
                CoreError::from(err)
            }
        })
    }

    pub(crate) fn exists(&self, key: &str) -> CoreResult<bool> {
        self.ensure_ready(key)?;
        Ok(self.backend.exists(key))
    }

    pub(crate) fn get_version(&self, key: &str) -> CoreResult<u32> {
        self.ensure_ready(key)?;
        if !self.backend.exists(key) {
            return Ok(0);
        }
        Ok(self.load_metadata(key)?.current_version)
    }

    fn current_info(&self, key: &str, meta: &VersionMetadata) -> CoreResult<VersionInfo> {
        let size = if meta.current_version == 0 {
            self.backend.size(key)?
        } else {
            u64::from(meta.file_size)
        };
        Ok(VersionInfo {
            version: meta.current_version,
            size,
            timestamp: (meta.current_version > 0).then_some(meta.timestamp),
            is_current: true,
        })
    }

    pub(crate) fn get_version_info(&self, key: &str) -> CoreResult<Option<VersionInfo>> {
        self.ensure_ready(key)?;
        if !self.backend.exists(key) {
            return Ok(None);
        }
        let meta = self.load_metadata(key)?;
        self.current_info(key, &meta).map(Some)
    }

    pub(crate) fn list_versions(&self, key: &str) -> CoreResult<Vec<VersionInfo>> {
        self.ensure_ready(key)?;
        if !self.backend.exists(key) {
            return Ok(Vec::new());
        }
        let meta = self.load_metadata(key)?;

        let mut versions = vec![self.current_info(key, &meta)?];
        for version in meta.history.iter().rev() {
            // Indexed ahead of the next write by a standalone archive.
            if version == meta.current_version {
                continue;
            }
            let snapshot = snapshot_key(key, version);
            if !self.backend.exists(&snapshot) {
                debug!(key, version, "indexed snapshot missing, omitted from listing");
                continue;
            }
            versions.push(VersionInfo {
                version,
                size: self.backend.size(&snapshot)?,
                timestamp: None,
                is_current: false,
            });
        }

        versions.sort_by(|a, b| b.version.cmp(&a.version));
        Ok(versions)
    }

    /// Maps a requested version to the resource holding its bytes.
    fn version_resource(&self, key: &str, version: u32) -> CoreResult<String> {
        if version == 0 {
            return if self.backend.exists(key) {
                Ok(normalize_key(key).to_string())
            } else {
                Err(CoreError::key_not_found(key))
            };
        }

        let meta = self.load_metadata(key)?;
        if version == meta.current_version && self.backend.exists(key) {
            return Ok(normalize_key(key).to_string());
        }
        let snapshot = snapshot_key(key, version);
        if meta.history.contains(version) && self.backend.exists(&snapshot) {
            Ok(snapshot)
        } else {
            Err(CoreError::version_not_found(key, version))
        }
    }

    pub(crate) fn read_version(&self, key: &str, version: u32) -> CoreResult<Vec<u8>> {
        self.ensure_ready(key)?;
        let resource = self.version_resource(key, version)?;
        Ok(self.backend.read_all(&resource)?)
    }

    pub(crate) fn read_version_into(
        &self,
        key: &str,
        version: u32,
        buf: &mut [u8],
    ) -> CoreResult<()> {
        self.ensure_ready(key)?;
        let resource = self.version_resource(key, version)?;

        let actual = self.backend.size(&resource)?;
        if buf.len() as u64 > actual {
            return Err(CoreError::SizeMismatch {
                expected: buf.len() as u64,
                actual,
            });
        }

        let data = self.backend.read(&resource, buf.len())?;
        buf.copy_from_slice(&data);
        debug!(key, version, bytes = buf.len(), "read version");
        Ok(())
    }

    pub(crate) fn has_changed(&self, key: &str, last_known_version: u32) -> CoreResult<bool> {
        Ok(self.get_version(key)? > last_known_version)
    }

    // === Maintenance ===

    pub(crate) fn cleanup_old_versions(&mut self, key: &str) -> CoreResult<u32> {
        self.ensure_ready(key)?;
        let mut meta = self.load_metadata(key)?;

        let mut cleaned = 0;
        while meta.history.is_over_capacity() {
            match self.evict_oldest(key, &mut meta) {
                Ok(true) => cleaned += 1,
                Ok(false) => break,
                Err(err) => {
                    warn!(key, error = %err, "cleanup stopped early");
                    break;
                }
            }
        }

        if cleaned > 0 {
            self.save_metadata(key, &meta)?;
            info!(key, cleaned, "cleaned up old versions");
        }
        Ok(cleaned)
    }

    pub(crate) fn cleanup_all(&mut self) -> CoreResult<u32> {
        self.ensure_mounted()?;
        let keys: Vec<String> = self
            .backend
            .list()?
            .into_iter()
            .filter_map(|k| k.strip_suffix(METADATA_SUFFIX).map(str::to_string))
            .collect();

        let mut cleaned = 0;
        for key in keys {
            match self.cleanup_old_versions(&key) {
                Ok(count) => cleaned += count,
                Err(err) => warn!(key = %key, error = %err, "skipping key during cleanup"),
            }
        }
        Ok(cleaned)
    }

    /// Snapshot resources of `key` present in the backend, indexed or not.
    fn snapshot_resources(&self, key: &str) -> CoreResult<Vec<(String, u32)>> {
        let base = normalize_key(key);
        Ok(self
            .backend
            .list()?
            .into_iter()
            .filter_map(|k| {
                let version = parse_snapshot_key(&k).filter(|(b, _)| *b == base)?.1;
                Some((k, version))
            })
            .collect())
    }

    pub(crate) fn purge_orphans(&mut self, key: &str) -> CoreResult<u32> {
        self.ensure_ready(key)?;
        let meta = self.load_metadata(key)?;

        let mut purged = 0;
        for (resource, version) in self.snapshot_resources(key)? {
            if meta.history.contains(version) {
                continue;
            }
            self.backend.delete(&resource)?;
            debug!(key, version, "purged orphaned snapshot");
            purged += 1;
        }

        if purged > 0 {
            self.stats.record_orphans_purged(u64::from(purged));
            info!(key, purged, "purged orphaned snapshots");
        }
        Ok(purged)
    }

    pub(crate) fn erase(&mut self, key: &str) -> CoreResult<()> {
        self.ensure_ready(key)?;
        if !self.backend.exists(key) {
            return Err(CoreError::key_not_found(key));
        }

        // Snapshots are found by listing so orphans go too; a corrupt
        // sidecar must not keep the key alive.
        for (resource, _) in self.snapshot_resources(key)? {
            ignore_missing(self.backend.delete(&resource))?;
        }
        ignore_missing(self.backend.delete(&metadata_key(key)))?;
        self.backend.delete(key)?;

        self.stats.record_erase();
        info!(key, "erased key and its history");
        Ok(())
    }
}

fn ignore_missing(result: Result<(), StorageError>) -> CoreResult<()> {
    match result {
        Err(err) if !err.is_not_found() => Err(err.into()),
        _ => Ok(()),
    }
}
