//! In-memory storage backend for testing.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use crate::key::{normalize_key, validate_key};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

/// An in-memory storage backend.
///
/// This backend stores all resources in memory and is suitable for:
/// - Unit tests
/// - Integration tests
/// - Ephemeral stores that don't need persistence
///
/// A fresh backend is mounted. [`InMemoryBackend::set_mounted`] simulates
/// the storage going away without discarding its content.
///
/// # Example
///
/// ```rust
/// use verso_storage::{StorageBackend, InMemoryBackend};
///
/// let mut backend = InMemoryBackend::new();
/// backend.write("a", b"test data").unwrap();
/// assert_eq!(backend.size("a").unwrap(), 9);
/// assert_eq!(backend.size("missing").unwrap(), 0);
/// ```
#[derive(Debug)]
pub struct InMemoryBackend {
    resources: RwLock<BTreeMap<String, Vec<u8>>>,
    mounted: AtomicBool,
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self {
            resources: RwLock::new(BTreeMap::new()),
            mounted: AtomicBool::new(true),
        }
    }
}

impl InMemoryBackend {
    /// Creates a new empty, mounted in-memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a backend pre-populated with resources.
    ///
    /// Useful for testing keys that existed before versioning was enabled.
    #[must_use]
    pub fn with_resources<I, K, V>(resources: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Vec<u8>>,
    {
        let map = resources
            .into_iter()
            .map(|(k, v)| {
                let key: String = k.into();
                (normalize_key(&key).to_string(), v.into())
            })
            .collect();
        Self {
            resources: RwLock::new(map),
            mounted: AtomicBool::new(true),
        }
    }

    /// Mounts or unmounts the backend. Content is kept either way.
    pub fn set_mounted(&self, mounted: bool) {
        self.mounted.store(mounted, Ordering::SeqCst);
    }

    /// Returns the number of stored resources.
    #[must_use]
    pub fn len(&self) -> usize {
        self.resources.read().len()
    }

    /// Returns true if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.resources.read().is_empty()
    }

    /// Removes every resource.
    pub fn clear(&mut self) {
        self.resources.write().clear();
    }

    fn check(&self, key: &str) -> StorageResult<()> {
        if !self.is_mounted() {
            return Err(StorageError::Unmounted);
        }
        validate_key(key)
    }
}

impl StorageBackend for InMemoryBackend {
    fn full_path(&self, key: &str) -> String {
        format!("mem:/{}", normalize_key(key))
    }

    fn read(&self, key: &str, len: usize) -> StorageResult<Vec<u8>> {
        self.check(key)?;
        let resources = self.resources.read();
        let data = resources
            .get(normalize_key(key))
            .ok_or_else(|| StorageError::not_found(key))?;

        if data.len() < len {
            return Err(StorageError::ShortRead {
                key: key.to_string(),
                requested: len,
                available: data.len() as u64,
            });
        }

        Ok(data[..len].to_vec())
    }

    fn write(&mut self, key: &str, data: &[u8]) -> StorageResult<()> {
        self.check(key)?;
        self.resources
            .write()
            .insert(normalize_key(key).to_string(), data.to_vec());
        Ok(())
    }

    fn delete(&mut self, key: &str) -> StorageResult<()> {
        self.check(key)?;
        self.resources
            .write()
            .remove(normalize_key(key))
            .map(|_| ())
            .ok_or_else(|| StorageError::not_found(key))
    }

    fn size(&self, key: &str) -> StorageResult<u64> {
        self.check(key)?;
        Ok(self
            .resources
            .read()
            .get(normalize_key(key))
            .map_or(0, |data| data.len() as u64))
    }

    fn exists(&self, key: &str) -> bool {
        self.check(key).is_ok() && self.resources.read().contains_key(normalize_key(key))
    }

    fn is_mounted(&self) -> bool {
        self.mounted.load(Ordering::SeqCst)
    }

    fn list(&self) -> StorageResult<Vec<String>> {
        if !self.is_mounted() {
            return Err(StorageError::Unmounted);
        }
        Ok(self.resources.read().keys().cloned().collect())
    }
}
