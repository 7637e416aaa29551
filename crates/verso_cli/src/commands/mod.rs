//! CLI command implementations.

pub mod get;
pub mod list;
pub mod maintenance;
pub mod put;
pub mod restore;
pub mod versions;

use std::path::Path;
use verso_core::{Config, VersionedStore};
use verso_storage::FileBackend;

/// The store every command operates on.
pub type Store = VersionedStore<FileBackend>;

/// Mounts `root` and wraps it in a versioned store.
pub fn open_store(
    root: &Path,
    max_history: usize,
    create_if_missing: bool,
) -> Result<Store, Box<dyn std::error::Error>> {
    let backend = FileBackend::mount(root, create_if_missing)
        .map_err(|e| format!("cannot mount {}: {e}", root.display()))?;
    Ok(VersionedStore::new(
        backend,
        Config::default().max_history(max_history),
    ))
}

/// Formats a byte count for humans.
pub fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.1} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

#[cfg(test)]
pub(crate) fn temp_store(max_history: usize) -> (tempfile::TempDir, Store) {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(dir.path(), max_history, true).unwrap();
    (dir, store)
}
