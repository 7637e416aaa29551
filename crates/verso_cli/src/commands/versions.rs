//! Versions and changed command implementations.

use super::{format_size, Store};
use serde::Serialize;

/// One retained version of a key.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct VersionRow {
    /// Version number.
    pub version: u32,
    /// Content size in bytes.
    pub size: u64,
    /// Seconds since the Unix epoch of the write, current version only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<u32>,
    /// Whether this is the current content.
    pub current: bool,
}

/// Listing of a key's versions.
#[derive(Debug, Serialize)]
pub struct VersionsResult {
    /// The listed key.
    pub key: String,
    /// Versions, newest first.
    pub versions: Vec<VersionRow>,
}

/// Collects the versions of `key`.
pub fn collect(store: &Store, key: &str) -> Result<VersionsResult, Box<dyn std::error::Error>> {
    let versions = store
        .list_versions(key)?
        .into_iter()
        .map(|info| VersionRow {
            version: info.version,
            size: info.size,
            timestamp: info.timestamp,
            current: info.is_current,
        })
        .collect();
    Ok(VersionsResult {
        key: key.to_string(),
        versions,
    })
}

/// Runs the versions command.
pub fn run(store: &Store, key: &str, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let result = collect(store, key)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => print_text_output(&result),
    }

    Ok(())
}

fn print_text_output(result: &VersionsResult) {
    if result.versions.is_empty() {
        println!("{}: no versions", result.key);
        return;
    }

    println!("{}", result.key);
    for row in &result.versions {
        let marker = if row.current { "*" } else { " " };
        match row.timestamp {
            Some(ts) => println!(
                "{marker} v{:<6} {:>10}  written at {ts}",
                row.version,
                format_size(row.size)
            ),
            None => println!("{marker} v{:<6} {:>10}", row.version, format_size(row.size)),
        }
    }
}

/// Runs the changed command. Prints whether `key` moved past `since`.
pub fn changed(store: &Store, key: &str, since: u32) -> Result<bool, Box<dyn std::error::Error>> {
    let changed = store.has_changed(key, since)?;
    let current = store.get_version(key)?;
    if changed {
        println!("{key}: changed (version {current} > {since})");
    } else {
        println!("{key}: unchanged (version {current})");
    }
    Ok(changed)
}
