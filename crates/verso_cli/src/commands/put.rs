//! Put command implementation.

use super::Store;
use tracing::info;

/// Writes `data` as the next version of `key` and prints the new version.
pub fn run(store: &Store, key: &str, data: &[u8]) -> Result<u32, Box<dyn std::error::Error>> {
    let version = store.write(key, data)?;
    info!(key, version, bytes = data.len(), "stored");
    println!("{key}: version {version} ({} bytes)", data.len());
    Ok(version)
}
