//! Ls command implementation.

use super::{format_size, Store};
use serde::Serialize;
use tracing::warn;
use verso_core::is_reserved_key;
use verso_storage::StorageBackend;

/// One stored key.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct KeyRow {
    /// The key.
    pub key: String,
    /// Current version, `0` for content that predates versioning.
    pub version: u32,
    /// Current content size in bytes.
    pub size: u64,
    /// Number of readable historical versions.
    pub history: usize,
}

/// Collects every content key under the store root.
///
/// Keys whose history cannot be read are logged and skipped.
pub fn collect(store: &Store) -> Result<Vec<KeyRow>, Box<dyn std::error::Error>> {
    let keys: Vec<String> = store
        .with_backend(|backend| backend.list())??
        .into_iter()
        .filter(|key| !is_reserved_key(key))
        .collect();

    let mut rows = Vec::with_capacity(keys.len());
    for key in keys {
        let versions = match store.list_versions(&key) {
            Ok(versions) => versions,
            Err(err) => {
                warn!(key = %key, error = %err, "skipping unreadable key");
                continue;
            }
        };
        let Some(current) = versions.first() else {
            continue;
        };
        rows.push(KeyRow {
            version: current.version,
            size: current.size,
            history: versions.len() - 1,
            key,
        });
    }
    Ok(rows)
}

/// Runs the ls command.
pub fn run(store: &Store, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let rows = collect(store)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
        _ => {
            for row in &rows {
                println!(
                    "{:<40} v{:<6} {:>10}  {} in history",
                    row.key,
                    row.version,
                    format_size(row.size),
                    row.history
                );
            }
        }
    }

    Ok(())
}
