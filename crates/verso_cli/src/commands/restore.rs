//! Restore command implementation.

use super::Store;

/// Copies retained `version` of `key` forward as a new version.
pub fn run(store: &Store, key: &str, version: u32) -> Result<u32, Box<dyn std::error::Error>> {
    let new_version = store.restore(key, version)?;
    println!("{key}: restored version {version} as version {new_version}");
    Ok(new_version)
}
