//! Key validation shared by all backends.

use crate::error::{StorageError, StorageResult};
use std::path::{Component, Path};

/// Maximum key length in bytes.
pub const MAX_KEY_LEN: usize = 255;

/// Strips a single leading `/` so `"/a"` and `"a"` name the same resource.
#[must_use]
pub fn normalize_key(key: &str) -> &str {
    key.strip_prefix('/').unwrap_or(key)
}

/// Checks that a key names a storable resource.
///
/// Rejects empty keys, keys containing NUL, keys ending in `/`, and keys
/// longer than [`MAX_KEY_LEN`] bytes. Every `/`-separated component must be
/// a plain name: empty, `.` and `..` components are refused, as is anything
/// the host would read as a root or drive prefix, so a key always stays
/// below the root it is joined to.
///
/// # Errors
///
/// Returns [`StorageError::InvalidKey`] describing the first rule violated.
pub fn validate_key(key: &str) -> StorageResult<()> {
    let normalized = normalize_key(key);
    if normalized.is_empty() {
        return Err(StorageError::invalid_key(key, "empty key"));
    }
    if normalized.contains('\0') {
        return Err(StorageError::invalid_key(key, "contains NUL"));
    }
    if normalized.ends_with('/') {
        return Err(StorageError::invalid_key(key, "names a directory"));
    }
    if normalized.split('/').any(|part| part == "..") {
        return Err(StorageError::invalid_key(key, "contains a `..` component"));
    }
    if normalized.split('/').any(|part| part.is_empty() || part == ".") {
        return Err(StorageError::invalid_key(key, "contains an empty or `.` component"));
    }
    if !Path::new(normalized)
        .components()
        .all(|c| matches!(c, Component::Normal(_)))
    {
        return Err(StorageError::invalid_key(key, "is not a relative path"));
    }
    if normalized.len() > MAX_KEY_LEN {
        return Err(StorageError::invalid_key(key, "longer than 255 bytes"));
    }
    Ok(())
}
