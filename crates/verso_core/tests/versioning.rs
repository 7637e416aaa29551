//! Integration tests for the versioned store.

use proptest::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use verso_core::{
    is_reserved_key, ArchivePolicy, Config, CoreError, MetadataRecovery, VersionInfo,
    VersionMetadata, VersionedStore, METADATA_SUFFIX,
};
use verso_storage::{FileBackend, InMemoryBackend, StorageBackend, StorageError, StorageResult};

/// An in-memory backend whose snapshot writes and deletes can be made to fail.
#[derive(Default)]
struct FlakyBackend {
    inner: InMemoryBackend,
    fail_snapshot_writes: AtomicBool,
    fail_deletes: AtomicBool,
}

impl FlakyBackend {
    fn injected(key: &str) -> StorageError {
        StorageError::Io(std::io::Error::other(format!("injected failure on {key}")))
    }
}

impl StorageBackend for FlakyBackend {
    fn full_path(&self, key: &str) -> String {
        self.inner.full_path(key)
    }

    fn read(&self, key: &str, len: usize) -> StorageResult<Vec<u8>> {
        self.inner.read(key, len)
    }

    fn write(&mut self, key: &str, data: &[u8]) -> StorageResult<()> {
        let snapshot = is_reserved_key(key) && !key.ends_with(METADATA_SUFFIX);
        if snapshot && self.fail_snapshot_writes.load(Ordering::SeqCst) {
            return Err(Self::injected(key));
        }
        self.inner.write(key, data)
    }

    fn delete(&mut self, key: &str) -> StorageResult<()> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(Self::injected(key));
        }
        self.inner.delete(key)
    }

    fn size(&self, key: &str) -> StorageResult<u64> {
        self.inner.size(key)
    }

    fn exists(&self, key: &str) -> bool {
        self.inner.exists(key)
    }

    fn is_mounted(&self) -> bool {
        self.inner.is_mounted()
    }

    fn list(&self) -> StorageResult<Vec<String>> {
        self.inner.list()
    }
}

fn memory_store(max_history: usize) -> VersionedStore<InMemoryBackend> {
    VersionedStore::new(
        InMemoryBackend::new(),
        Config::default().max_history(max_history),
    )
}

fn flaky_store(config: Config) -> VersionedStore<FlakyBackend> {
    VersionedStore::new(FlakyBackend::default(), config)
}

fn listed(store: &VersionedStore<impl StorageBackend>, key: &str) -> Vec<u32> {
    store
        .list_versions(key)
        .unwrap()
        .iter()
        .map(|v| v.version)
        .collect()
}

// ============================================================================
// Basic lifecycle
// ============================================================================

#[test]
fn two_writes_then_restore() {
    let store = memory_store(5);

    assert_eq!(store.write("a", b"v1").unwrap(), 1);
    assert_eq!(store.get_version("a").unwrap(), 1);

    assert_eq!(store.write("a", b"v22").unwrap(), 2);
    assert_eq!(store.get_version("a").unwrap(), 2);

    let mut buf = [0u8; 2];
    store.read_version_into("a", 1, &mut buf).unwrap();
    assert_eq!(&buf, b"v1");

    let versions = store.list_versions("a").unwrap();
    assert_eq!(versions.len(), 2);
    assert_eq!(
        (versions[0].version, versions[0].size, versions[0].is_current),
        (2, 3, true)
    );
    assert_eq!(
        versions[1],
        VersionInfo {
            version: 1,
            size: 2,
            timestamp: None,
            is_current: false,
        }
    );
    assert!(versions[0].timestamp.is_some());

    assert_eq!(store.restore("a", 1).unwrap(), 3);
    assert_eq!(store.read_version("a", 0).unwrap(), b"v1");
    assert_eq!(store.get_version("a").unwrap(), 3);
}

#[test]
fn missing_key_reads_as_untracked() {
    let store = memory_store(5);

    assert_eq!(store.get_version("nope").unwrap(), 0);
    assert_eq!(store.get_version_info("nope").unwrap(), None);
    assert!(store.list_versions("nope").unwrap().is_empty());
    assert!(!store.has_changed("nope", 0).unwrap());
    assert!(!store.exists("nope").unwrap());
    assert!(matches!(
        store.read("nope"),
        Err(CoreError::KeyNotFound { .. })
    ));
    assert!(matches!(
        store.read_version("nope", 0),
        Err(CoreError::KeyNotFound { .. })
    ));
}

#[test]
fn version_info_describes_current_content() {
    let store = memory_store(5);
    store.write("cfg", b"hello").unwrap();

    let info = store.get_version_info("cfg").unwrap().unwrap();
    assert_eq!(info.version, 1);
    assert_eq!(info.size, 5);
    assert!(info.is_current);
    assert!(info.timestamp.is_some());
}

#[test]
fn has_changed_is_strict() {
    let store = memory_store(5);
    store.write("a", b"1").unwrap();
    store.write("a", b"2").unwrap();

    assert!(store.has_changed("a", 0).unwrap());
    assert!(store.has_changed("a", 1).unwrap());
    assert!(!store.has_changed("a", 2).unwrap());
    assert!(!store.has_changed("a", 3).unwrap());
}

#[test]
fn metadata_tracks_current_content() {
    let store = memory_store(3);
    store.write("a", b"first").unwrap();
    store.write("a", b"second!").unwrap();

    let backend = store.into_inner();
    let record = backend.read_all("a.meta").unwrap();
    let meta = VersionMetadata::decode("a", &record, 3).unwrap();

    assert_eq!(meta.current_version, 2);
    assert_eq!(meta.file_size, 7);
    assert_eq!(meta.checksum, verso_core::checksum(b"second!"));
    assert_eq!(meta.history.iter().collect::<Vec<_>>(), vec![1]);
    assert_eq!(record.len(), verso_core::HEADER_SIZE + 3 * 4);
}

// ============================================================================
// Eviction
// ============================================================================

#[test]
fn oldest_versions_are_evicted_first() {
    let store = memory_store(5);
    for i in 1..=7u32 {
        store.write("a", format!("body {i}").as_bytes()).unwrap();
    }

    assert_eq!(listed(&store, "a"), vec![7, 6, 5, 4, 3, 2]);
    assert!(matches!(
        store.read_version("a", 1),
        Err(CoreError::VersionNotFound { version: 1, .. })
    ));
    assert_eq!(store.read_version("a", 2).unwrap(), b"body 2");
    assert_eq!(store.stats().evictions(), 1);

    let backend = store.into_inner();
    assert!(!backend.exists("a.v1"));
}

#[test]
fn already_missing_snapshot_still_evicts() {
    let store = memory_store(2);
    store.write("a", b"1").unwrap();
    store.write("a", b"2").unwrap();
    store.write("a", b"3").unwrap();

    store
        .with_backend(|b| b.delete("a.v1"))
        .unwrap()
        .unwrap();
    // Missing snapshots are left out of the listing.
    assert_eq!(listed(&store, "a"), vec![3, 2]);

    assert_eq!(store.write("a", b"4").unwrap(), 4);
    assert_eq!(listed(&store, "a"), vec![4, 3, 2]);
}

#[test]
fn evicted_snapshot_is_not_readable_even_if_left_behind() {
    let store = memory_store(1);
    store.write("a", b"1").unwrap();
    store.write("a", b"2").unwrap();
    store.write("a", b"3").unwrap();

    // Put back a stray copy of an evicted version.
    store
        .with_backend(|b| b.write("a.v1", b"1"))
        .unwrap()
        .unwrap();

    assert!(matches!(
        store.read_version("a", 1),
        Err(CoreError::VersionNotFound { .. })
    ));
    assert_eq!(store.purge_orphans("a").unwrap(), 1);
    assert_eq!(store.stats().orphans_purged(), 1);
}

// ============================================================================
// Archive failures
// ============================================================================

#[test]
fn best_effort_archive_failure_still_writes() {
    let store = flaky_store(Config::default());
    store.write("a", b"one").unwrap();
    store
        .with_backend(|b| b.fail_snapshot_writes.store(true, Ordering::SeqCst))
        .unwrap();

    assert_eq!(store.write("a", b"two").unwrap(), 2);
    assert_eq!(store.read("a").unwrap(), b"two");
    assert_eq!(listed(&store, "a"), vec![2]);
    assert_eq!(store.stats().archive_failures(), 1);
    assert!(matches!(
        store.read_version("a", 1),
        Err(CoreError::VersionNotFound { .. })
    ));
}

#[test]
fn fail_closed_archive_failure_refuses_write() {
    let store = flaky_store(Config::default().archive_policy(ArchivePolicy::FailClosed));
    store.write("a", b"one").unwrap();
    store
        .with_backend(|b| b.fail_snapshot_writes.store(true, Ordering::SeqCst))
        .unwrap();

    let err = store.write("a", b"two").unwrap_err();
    assert!(matches!(err, CoreError::ArchiveFailed { ref key, .. } if key == "a"));
    assert_eq!(store.get_version("a").unwrap(), 1);
    assert_eq!(store.read("a").unwrap(), b"one");
}

#[test]
fn failed_eviction_fails_the_archive() {
    let store = flaky_store(
        Config::default()
            .max_history(1)
            .archive_policy(ArchivePolicy::FailClosed),
    );
    store.write("a", b"one").unwrap();
    store.write("a", b"two").unwrap();
    store
        .with_backend(|b| b.fail_deletes.store(true, Ordering::SeqCst))
        .unwrap();

    assert!(matches!(
        store.write("a", b"three"),
        Err(CoreError::ArchiveFailed { .. })
    ));
    assert_eq!(store.get_version("a").unwrap(), 2);
    assert_eq!(store.read_version("a", 1).unwrap(), b"one");

    // The snapshot written before eviction failed is left unindexed.
    store
        .with_backend(|b| b.fail_deletes.store(false, Ordering::SeqCst))
        .unwrap();
    assert_eq!(store.purge_orphans("a").unwrap(), 1);
    assert_eq!(store.write("a", b"three").unwrap(), 3);
    assert_eq!(listed(&store, "a"), vec![3, 2]);
}

// ============================================================================
// Metadata recovery and unversioned content
// ============================================================================

#[test]
fn corrupt_metadata_resets_history() {
    let store = memory_store(5);
    store.write("a", b"one").unwrap();
    store.write("a", b"two").unwrap();
    store
        .with_backend(|b| b.write("a.meta", b"garbage"))
        .unwrap()
        .unwrap();

    assert_eq!(store.get_version("a").unwrap(), 0);
    assert!(store.stats().metadata_resets() >= 1);

    // Versioning starts over at 1.
    assert_eq!(store.write("a", b"three").unwrap(), 1);
    assert_eq!(store.get_version("a").unwrap(), 1);
    assert_eq!(listed(&store, "a"), vec![1]);
    assert_eq!(store.read_version("a", 1).unwrap(), b"three");

    // The replaced content and the stale snapshot are unindexed leftovers.
    let kept = store.with_backend(|b| b.read_all("a.v0")).unwrap().unwrap();
    assert_eq!(kept, b"two");
    assert_eq!(store.purge_orphans("a").unwrap(), 2);

    assert_eq!(store.write("a", b"four").unwrap(), 2);
    assert_eq!(store.read_version("a", 1).unwrap(), b"three");
}

#[test]
fn corrupt_metadata_can_be_surfaced() {
    let store = VersionedStore::new(
        InMemoryBackend::new(),
        Config::default().metadata_recovery(MetadataRecovery::Fail),
    );
    store.write("a", b"one").unwrap();
    store
        .with_backend(|b| b.write("a.meta", &[0u8; 7]))
        .unwrap()
        .unwrap();

    assert!(matches!(
        store.get_version("a"),
        Err(CoreError::CorruptMetadata { .. })
    ));
    assert!(matches!(
        store.write("a", b"two"),
        Err(CoreError::CorruptMetadata { .. })
    ));
    assert_eq!(store.read("a").unwrap(), b"one");
}

#[test]
fn first_write_over_unversioned_content_is_version_one() {
    let backend = InMemoryBackend::with_resources([("legacy", b"old".to_vec())]);
    let store = VersionedStore::new(backend, Config::default());

    assert_eq!(store.get_version("legacy").unwrap(), 0);
    let info = store.get_version_info("legacy").unwrap().unwrap();
    assert_eq!((info.version, info.size, info.timestamp), (0, 3, None));

    assert_eq!(store.write("legacy", b"new").unwrap(), 1);
    assert_eq!(listed(&store, "legacy"), vec![1]);
    assert_eq!(store.read_version("legacy", 1).unwrap(), b"new");

    // The old bytes are kept unindexed and take no version number.
    let kept = store
        .with_backend(|b| b.read_all("legacy.v0"))
        .unwrap()
        .unwrap();
    assert_eq!(kept, b"old");
    assert_eq!(store.purge_orphans("legacy").unwrap(), 1);

    assert_eq!(store.write("legacy", b"newer").unwrap(), 2);
    assert_eq!(listed(&store, "legacy"), vec![2, 1]);
}

#[test]
fn archive_of_unversioned_content_takes_no_version() {
    let backend = InMemoryBackend::with_resources([("legacy", b"old".to_vec())]);
    let store = VersionedStore::new(backend, Config::default());

    assert_eq!(store.archive_current("legacy").unwrap(), 0);
    assert_eq!(store.get_version("legacy").unwrap(), 0);
    assert_eq!(store.write("legacy", b"new").unwrap(), 1);
}

#[test]
fn standalone_archive_is_not_listed_twice() {
    let store = memory_store(5);
    store.write("a", b"one").unwrap();

    assert_eq!(store.archive_current("a").unwrap(), 1);
    assert_eq!(listed(&store, "a"), vec![1]);

    assert_eq!(store.write("a", b"two").unwrap(), 2);
    assert_eq!(listed(&store, "a"), vec![2, 1]);
    assert_eq!(store.read_version("a", 1).unwrap(), b"one");
    assert_eq!(store.stats().archives(), 1);
}

#[test]
fn archive_of_missing_key_fails() {
    let store = memory_store(5);
    assert!(matches!(
        store.archive_current("ghost"),
        Err(CoreError::KeyNotFound { .. })
    ));
}

// ============================================================================
// Keys and mount state
// ============================================================================

#[test]
fn reserved_keys_are_rejected() {
    let store = memory_store(5);
    for key in ["a.meta", "a.v3", "dir/a.v10", "../escape", ""] {
        assert!(
            matches!(store.write(key, b"x"), Err(CoreError::InvalidKey { .. })),
            "{key:?} should be rejected"
        );
    }
    assert_eq!(store.write("a.version", b"x").unwrap(), 1);
    assert_eq!(store.write("notes.v", b"x").unwrap(), 1);
}

#[test]
fn leading_slash_names_the_same_key() {
    let store = memory_store(5);
    store.write("/cfg/net", b"1").unwrap();
    store.write("cfg/net", b"2").unwrap();

    assert_eq!(store.get_version("/cfg/net").unwrap(), 2);
    assert_eq!(store.read_version("cfg/net", 1).unwrap(), b"1");
}

#[test]
fn unmounted_backend_is_unavailable() {
    let store = memory_store(5);
    store.write("a", b"one").unwrap();
    store.with_backend(|b| b.set_mounted(false)).unwrap();

    assert!(matches!(
        store.write("a", b"two"),
        Err(CoreError::BackendUnavailable)
    ));
    assert!(matches!(
        store.get_version("a"),
        Err(CoreError::BackendUnavailable)
    ));
    assert!(matches!(
        store.list_versions("a"),
        Err(CoreError::BackendUnavailable)
    ));
    assert!(matches!(store.cleanup_all(), Err(CoreError::BackendUnavailable)));

    store.with_backend(|b| b.set_mounted(true)).unwrap();
    assert_eq!(store.get_version("a").unwrap(), 1);
}

// ============================================================================
// Reads
// ============================================================================

#[test]
fn read_version_into_checks_buffer_length() {
    let store = memory_store(5);
    store.write("a", b"abcdef").unwrap();
    store.write("a", b"xy").unwrap();

    let mut prefix = [0u8; 3];
    store.read_version_into("a", 1, &mut prefix).unwrap();
    assert_eq!(&prefix, b"abc");

    let mut too_long = [0u8; 3];
    assert!(matches!(
        store.read_version_into("a", 0, &mut too_long),
        Err(CoreError::SizeMismatch {
            expected: 3,
            actual: 2
        })
    ));
}

#[test]
fn current_version_number_reads_canonical_content() {
    let store = memory_store(5);
    store.write("a", b"one").unwrap();
    store.write("a", b"two").unwrap();

    assert_eq!(store.read_version("a", 2).unwrap(), b"two");
    assert!(matches!(
        store.read_version("a", 3),
        Err(CoreError::VersionNotFound { version: 3, .. })
    ));
}

// ============================================================================
// Maintenance
// ============================================================================

#[test]
fn erase_removes_everything_including_orphans() {
    let store = memory_store(5);
    store.write("a", b"1").unwrap();
    store.write("a", b"2").unwrap();
    store.write("a", b"3").unwrap();
    store.write("b", b"keep").unwrap();
    store
        .with_backend(|b| b.write("a.v99", b"stray"))
        .unwrap()
        .unwrap();

    store.erase("a").unwrap();

    assert_eq!(store.get_version("a").unwrap(), 0);
    let remaining = store.with_backend(|b| b.list()).unwrap().unwrap();
    assert_eq!(remaining, vec!["b".to_string(), "b.meta".to_string()]);
    assert!(matches!(store.erase("a"), Err(CoreError::KeyNotFound { .. })));

    // Writing again starts a fresh history.
    assert_eq!(store.write("a", b"new").unwrap(), 1);
}

#[test]
fn erase_tolerates_corrupt_metadata() {
    let store = memory_store(5);
    store.write("a", b"1").unwrap();
    store.write("a", b"2").unwrap();
    store
        .with_backend(|b| b.write("a.meta", b"junk"))
        .unwrap()
        .unwrap();

    store.erase("a").unwrap();
    assert!(store.with_backend(|b| b.is_empty()).unwrap());
}

#[test]
fn cleanup_trims_histories_written_with_a_larger_depth() {
    let wide = memory_store(5);
    for i in 1..=7u32 {
        wide.write("a", format!("a{i}").as_bytes()).unwrap();
        wide.write("b", format!("b{i}").as_bytes()).unwrap();
    }

    let narrow = VersionedStore::new(wide.into_inner(), Config::default().max_history(2));
    // The wider record still decodes in full.
    assert_eq!(listed(&narrow, "a"), vec![7, 6, 5, 4, 3, 2]);

    assert_eq!(narrow.cleanup_old_versions("a").unwrap(), 3);
    assert_eq!(listed(&narrow, "a"), vec![7, 6, 5]);
    assert_eq!(narrow.cleanup_old_versions("a").unwrap(), 0);

    assert_eq!(narrow.cleanup_all().unwrap(), 3);
    assert_eq!(listed(&narrow, "b"), vec![7, 6, 5]);
    assert_eq!(narrow.read_version("b", 5).unwrap(), b"b5");
}

#[test]
fn purge_orphans_keeps_indexed_snapshots() {
    let store = memory_store(5);
    store.write("a", b"1").unwrap();
    store.write("a", b"2").unwrap();
    store
        .with_backend(|b| {
            b.write("a.v40", b"x")?;
            b.write("ab.v40", b"other key")
        })
        .unwrap()
        .unwrap();

    assert_eq!(store.purge_orphans("a").unwrap(), 1);
    assert_eq!(store.read_version("a", 1).unwrap(), b"1");
    assert!(store.with_backend(|b| b.exists("ab.v40")).unwrap());
}

// ============================================================================
// File backend
// ============================================================================

#[test]
fn file_backed_history_survives_remount() {
    let dir = tempfile::tempdir().unwrap();

    {
        let backend = FileBackend::mount(dir.path(), true).unwrap();
        let store = VersionedStore::new(backend, Config::default().max_history(2));
        store.write("config/wifi.json", b"{\"ssid\":\"a\"}").unwrap();
        store.write("config/wifi.json", b"{\"ssid\":\"b\"}").unwrap();
        store.write("config/wifi.json", b"{\"ssid\":\"c\"}").unwrap();
    }

    assert!(dir.path().join("config/wifi.json.meta").is_file());
    assert!(dir.path().join("config/wifi.json.v2").is_file());

    let backend = FileBackend::mount(dir.path(), false).unwrap();
    let store = VersionedStore::new(backend, Config::default().max_history(2));
    assert_eq!(store.get_version("config/wifi.json").unwrap(), 3);
    assert_eq!(listed(&store, "config/wifi.json"), vec![3, 2, 1]);
    assert_eq!(
        store.read_version("config/wifi.json", 1).unwrap(),
        b"{\"ssid\":\"a\"}"
    );

    assert_eq!(store.restore("config/wifi.json", 1).unwrap(), 4);
    assert_eq!(listed(&store, "config/wifi.json"), vec![4, 3, 2]);
    assert!(!dir.path().join("config/wifi.json.v1").exists());
}

#[test]
fn file_backend_unmount_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let backend = FileBackend::mount(dir.path(), true).unwrap();
    let store = VersionedStore::new(backend, Config::default());
    store.write("a", b"1").unwrap();

    store.with_backend(FileBackend::unmount).unwrap();
    assert!(matches!(
        store.read("a"),
        Err(CoreError::BackendUnavailable)
    ));

    store.with_backend(FileBackend::remount).unwrap().unwrap();
    assert_eq!(store.read("a").unwrap(), b"1");
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn history_holds_the_most_recent_versions(
        max_history in 1usize..6,
        bodies in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..16), 1..20),
    ) {
        let store = memory_store(max_history);
        for body in &bodies {
            store.write("k", body).unwrap();
        }

        let n = bodies.len() as u32;
        prop_assert_eq!(store.get_version("k").unwrap(), n);

        let versions = store.list_versions("k").unwrap();
        prop_assert!(versions.len() <= max_history + 1);
        prop_assert!(versions.windows(2).all(|w| w[0].version > w[1].version));
        prop_assert_eq!(versions.iter().filter(|v| v.is_current).count(), 1);
        prop_assert!(versions[0].is_current);
        prop_assert_eq!(versions[0].version, n);

        let retained = (n - 1).min(max_history as u32);
        let expected: Vec<u32> = (n - retained..=n).rev().collect();
        let actual: Vec<u32> = versions.iter().map(|v| v.version).collect();
        prop_assert_eq!(actual, expected);

        for info in &versions {
            let body = &bodies[info.version as usize - 1];
            prop_assert_eq!(info.size, body.len() as u64);
            prop_assert_eq!(&store.read_version("k", info.version).unwrap(), body);
        }
    }

    #[test]
    fn restore_copies_retained_content_forward(
        bodies in prop::collection::vec(prop::collection::vec(any::<u8>(), 1..16), 2..8),
        pick in any::<prop::sample::Index>(),
    ) {
        let store = memory_store(8);
        for body in &bodies {
            store.write("k", body).unwrap();
        }

        let before = store.get_version("k").unwrap();
        let version = pick.index(bodies.len() - 1) as u32 + 1;

        let restored = store.restore("k", version).unwrap();
        prop_assert!(restored > before);
        prop_assert_eq!(store.get_version("k").unwrap(), restored);
        prop_assert_eq!(&store.read_version("k", 0).unwrap(), &bodies[version as usize - 1]);
        prop_assert!(store.has_changed("k", before).unwrap());
        prop_assert!(!store.has_changed("k", restored).unwrap());
    }
}
