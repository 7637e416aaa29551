//! Rm, cleanup and purge command implementations.

use super::Store;
use tracing::info;

/// Erases `key` with its metadata and snapshots.
pub fn remove(store: &Store, key: &str) -> Result<(), Box<dyn std::error::Error>> {
    store.erase(key)?;
    println!("{key}: erased");
    Ok(())
}

/// Trims histories to the configured depth, for one key or all of them.
pub fn cleanup(store: &Store, key: Option<&str>) -> Result<u32, Box<dyn std::error::Error>> {
    let cleaned = match key {
        Some(key) => store.cleanup_old_versions(key)?,
        None => store.cleanup_all()?,
    };
    info!(cleaned, "cleanup finished");
    println!("evicted {cleaned} snapshot(s)");
    Ok(cleaned)
}

/// Deletes snapshots of `key` that its metadata does not index.
pub fn purge(store: &Store, key: &str) -> Result<u32, Box<dyn std::error::Error>> {
    let purged = store.purge_orphans(key)?;
    println!("{key}: purged {purged} orphaned snapshot(s)");
    Ok(purged)
}
