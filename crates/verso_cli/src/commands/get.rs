//! Get command implementation.

use super::Store;
use std::io::Write;
use std::path::Path;

/// Reads `version` of `key` (0 for the current content) to `out` or stdout.
pub fn run(
    store: &Store,
    key: &str,
    version: u32,
    out: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let data = store.read_version(key, version)?;

    match out {
        Some(path) => {
            std::fs::write(path, &data)?;
            eprintln!("wrote {} bytes to {}", data.len(), path.display());
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&data)?;
            stdout.flush()?;
        }
    }

    Ok(())
}
