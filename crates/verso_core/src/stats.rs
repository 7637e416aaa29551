//! Versioning statistics.
//!
//! Counters for monitoring how often history is archived, evicted and
//! restored, and how often the engine had to paper over a failure.
//!
//! # Usage
//!
//! ```rust
//! use verso_core::{Config, VersionedStore};
//! use verso_storage::InMemoryBackend;
//!
//! let store = VersionedStore::new(InMemoryBackend::new(), Config::default());
//! store.write("a", b"1").unwrap();
//! store.write("a", b"2").unwrap();
//!
//! let stats = store.stats().snapshot();
//! assert_eq!(stats.writes, 2);
//! assert_eq!(stats.archives, 1);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

/// Versioning statistics.
///
/// All counters are atomic and monotonically increasing.
#[derive(Debug, Default)]
pub struct VersioningStats {
    /// Canonical writes, restores included.
    writes: AtomicU64,
    /// Bytes written to canonical resources.
    bytes_written: AtomicU64,
    /// Snapshots archived and indexed.
    archives: AtomicU64,
    /// Archive attempts that failed.
    archive_failures: AtomicU64,
    /// Snapshots evicted from history.
    evictions: AtomicU64,
    /// Successful restores.
    restores: AtomicU64,
    /// Corrupt sidecars replaced by a fresh record.
    metadata_resets: AtomicU64,
    /// Keys erased with their history.
    erases: AtomicU64,
    /// Unindexed snapshot files removed.
    orphans_purged: AtomicU64,
}

impl VersioningStats {
    /// Creates a new stats instance.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_write(&self, bytes: u64) {
        self.writes.fetch_add(1, Ordering::Relaxed);
        self.bytes_written.fetch_add(bytes, Ordering::Relaxed);
    }

    pub(crate) fn record_archive(&self) {
        self.archives.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_archive_failure(&self) {
        self.archive_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_restore(&self) {
        self.restores.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_metadata_reset(&self) {
        self.metadata_resets.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_erase(&self) {
        self.erases.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_orphans_purged(&self, count: u64) {
        self.orphans_purged.fetch_add(count, Ordering::Relaxed);
    }

    /// Returns the number of canonical writes.
    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    /// Returns the number of bytes written to canonical resources.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written.load(Ordering::Relaxed)
    }

    /// Returns the number of archived snapshots.
    pub fn archives(&self) -> u64 {
        self.archives.load(Ordering::Relaxed)
    }

    /// Returns the number of failed archive attempts.
    ///
    /// Under best-effort archiving each one is a write whose previous
    /// content is not retrievable.
    pub fn archive_failures(&self) -> u64 {
        self.archive_failures.load(Ordering::Relaxed)
    }

    /// Returns the number of evicted snapshots.
    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    /// Returns the number of restores.
    pub fn restores(&self) -> u64 {
        self.restores.load(Ordering::Relaxed)
    }

    /// Returns the number of metadata resets.
    pub fn metadata_resets(&self) -> u64 {
        self.metadata_resets.load(Ordering::Relaxed)
    }

    /// Returns the number of erased keys.
    pub fn erases(&self) -> u64 {
        self.erases.load(Ordering::Relaxed)
    }

    /// Returns the number of purged orphan snapshots.
    pub fn orphans_purged(&self) -> u64 {
        self.orphans_purged.load(Ordering::Relaxed)
    }

    /// Returns a snapshot of all stats.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            writes: self.writes(),
            bytes_written: self.bytes_written(),
            archives: self.archives(),
            archive_failures: self.archive_failures(),
            evictions: self.evictions(),
            restores: self.restores(),
            metadata_resets: self.metadata_resets(),
            erases: self.erases(),
            orphans_purged: self.orphans_purged(),
        }
    }
}

/// A point-in-time copy of [`VersioningStats`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    /// Canonical writes, restores included.
    pub writes: u64,
    /// Bytes written to canonical resources.
    pub bytes_written: u64,
    /// Snapshots archived and indexed.
    pub archives: u64,
    /// Archive attempts that failed.
    pub archive_failures: u64,
    /// Snapshots evicted from history.
    pub evictions: u64,
    /// Successful restores.
    pub restores: u64,
    /// Corrupt sidecars replaced by a fresh record.
    pub metadata_resets: u64,
    /// Keys erased with their history.
    pub erases: u64,
    /// Unindexed snapshot files removed.
    pub orphans_purged: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_stats_are_zero() {
        let stats = VersioningStats::new();
        assert_eq!(stats.snapshot(), StatsSnapshot::default());
    }

    #[test]
    fn record_operations() {
        let stats = VersioningStats::new();

        stats.record_write(100);
        stats.record_write(50);
        stats.record_archive();
        stats.record_eviction();
        stats.record_orphans_purged(3);

        let snap = stats.snapshot();
        assert_eq!(snap.writes, 2);
        assert_eq!(snap.bytes_written, 150);
        assert_eq!(snap.archives, 1);
        assert_eq!(snap.evictions, 1);
        assert_eq!(snap.orphans_purged, 3);
        assert_eq!(snap.restores, 0);
    }

    #[test]
    fn concurrent_updates() {
        use std::sync::Arc;
        use std::thread;

        let stats = Arc::new(VersioningStats::new());
        let mut handles = vec![];

        for _ in 0..10 {
            let s = Arc::clone(&stats);
            handles.push(thread::spawn(move || {
                for _ in 0..100 {
                    s.record_write(1);
                    s.record_archive_failure();
                }
            }));
        }

        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(stats.writes(), 1000);
        assert_eq!(stats.archive_failures(), 1000);
    }
}
