//! File-based storage backend for persistent storage.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use crate::key::{normalize_key, validate_key};
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Suffix of the scratch file a write goes through before it is renamed
/// over the target.
const TEMP_SUFFIX: &str = ".verso-tmp";

/// A file-based storage backend.
///
/// Every key maps to one regular file below a root directory, which plays
/// the role of the mount point. A `/` inside a key creates subdirectories.
///
/// # Durability
///
/// `write` goes through a scratch file that is fsynced and then renamed
/// over the target, so a resource is replaced in one step and a crash never
/// leaves a half-written resource behind.
///
/// # Example
///
/// ```no_run
/// use verso_storage::{StorageBackend, FileBackend};
/// use std::path::Path;
///
/// let mut backend = FileBackend::mount(Path::new("data"), true).unwrap();
/// backend.write("config/wifi.json", b"{}").unwrap();
/// ```
#[derive(Debug)]
pub struct FileBackend {
    root: PathBuf,
    mounted: bool,
}

impl FileBackend {
    /// Mounts the directory at `root`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The directory doesn't exist and `create_if_missing` is false
    /// - `root` exists but is not a directory
    /// - I/O errors occur
    pub fn mount(root: &Path, create_if_missing: bool) -> StorageResult<Self> {
        if !root.exists() {
            if create_if_missing {
                fs::create_dir_all(root)?;
            } else {
                return Err(StorageError::Io(io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("storage root does not exist: {}", root.display()),
                )));
            }
        }

        if !root.is_dir() {
            return Err(StorageError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("storage root is not a directory: {}", root.display()),
            )));
        }

        info!(root = %root.display(), "storage mounted");
        Ok(Self {
            root: root.to_path_buf(),
            mounted: true,
        })
    }

    /// Returns the root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Detaches the backend. Further I/O fails with [`StorageError::Unmounted`].
    pub fn unmount(&mut self) {
        if self.mounted {
            self.mounted = false;
            info!(root = %self.root.display(), "storage unmounted");
        }
    }

    /// Re-attaches a previously unmounted backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the root directory has disappeared.
    pub fn remount(&mut self) -> StorageResult<()> {
        if !self.root.is_dir() {
            return Err(StorageError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("storage root does not exist: {}", self.root.display()),
            )));
        }
        self.mounted = true;
        Ok(())
    }

    /// Erases every resource below the root. The root itself is kept.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend is unmounted or an I/O error occurs.
    pub fn format(&mut self) -> StorageResult<()> {
        if !self.mounted {
            return Err(StorageError::Unmounted);
        }
        warn!(root = %self.root.display(), "formatting storage, all resources are erased");
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.is_dir() {
                fs::remove_dir_all(&path)?;
            } else {
                fs::remove_file(&path)?;
            }
        }
        Ok(())
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(normalize_key(key))
    }

    fn check(&self, key: &str) -> StorageResult<PathBuf> {
        if !self.mounted {
            return Err(StorageError::Unmounted);
        }
        validate_key(key)?;
        if key.ends_with(TEMP_SUFFIX) {
            return Err(StorageError::invalid_key(key, "reserved scratch suffix"));
        }
        Ok(self.path_for(key))
    }

    /// Removes directories left empty by a delete, stopping at the root.
    fn prune_empty_parents(&self, path: &Path) {
        let mut dir = path.parent();
        while let Some(current) = dir {
            if current == self.root || !current.starts_with(&self.root) {
                break;
            }
            // Fails on the first non-empty directory.
            if fs::remove_dir(current).is_err() {
                break;
            }
            dir = current.parent();
        }
    }

    fn collect_keys(&self, dir: &Path, keys: &mut Vec<String>) -> io::Result<()> {
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            if entry.file_type()?.is_dir() {
                self.collect_keys(&path, keys)?;
                continue;
            }
            let Ok(relative) = path.strip_prefix(&self.root) else {
                continue;
            };
            let key = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            if !key.ends_with(TEMP_SUFFIX) {
                keys.push(key);
            }
        }
        Ok(())
    }

    /// Syncs a directory so a rename inside it is durable.
    #[cfg(unix)]
    fn sync_directory(dir: &Path) -> io::Result<()> {
        File::open(dir)?.sync_all()
    }

    #[cfg(not(unix))]
    fn sync_directory(_dir: &Path) -> io::Result<()> {
        // NTFS journals metadata updates; directory handles cannot be fsynced
        Ok(())
    }
}

fn map_not_found(err: io::Error, key: &str) -> StorageError {
    if err.kind() == io::ErrorKind::NotFound {
        StorageError::not_found(key)
    } else {
        StorageError::Io(err)
    }
}

impl StorageBackend for FileBackend {
    fn full_path(&self, key: &str) -> String {
        self.path_for(key).display().to_string()
    }

    fn read(&self, key: &str, len: usize) -> StorageResult<Vec<u8>> {
        let path = self.check(key)?;
        let mut file = File::open(&path).map_err(|e| map_not_found(e, key))?;

        let available = file.metadata()?.len();
        if available < len as u64 {
            return Err(StorageError::ShortRead {
                key: key.to_string(),
                requested: len,
                available,
            });
        }

        let mut buffer = vec![0u8; len];
        file.read_exact(&mut buffer)?;
        Ok(buffer)
    }

    fn write(&mut self, key: &str, data: &[u8]) -> StorageResult<()> {
        let path = self.check(key)?;
        let parent = path.parent().unwrap_or(&self.root).to_path_buf();
        fs::create_dir_all(&parent)?;

        let mut temp_name = path.clone().into_os_string();
        temp_name.push(TEMP_SUFFIX);
        let temp_path = PathBuf::from(temp_name);

        let written = File::create(&temp_path)
            .and_then(|mut file| {
                file.write_all(data)?;
                file.sync_all()
            })
            .and_then(|()| fs::rename(&temp_path, &path));
        if let Err(err) = written {
            let _ = fs::remove_file(&temp_path);
            return Err(err.into());
        }
        Self::sync_directory(&parent)?;

        debug!(key, bytes = data.len(), "resource written");
        Ok(())
    }

    fn delete(&mut self, key: &str) -> StorageResult<()> {
        let path = self.check(key)?;
        fs::remove_file(&path).map_err(|e| map_not_found(e, key))?;
        self.prune_empty_parents(&path);
        debug!(key, "resource deleted");
        Ok(())
    }

    fn size(&self, key: &str) -> StorageResult<u64> {
        let path = self.check(key)?;
        match fs::metadata(&path) {
            Ok(meta) if meta.is_file() => Ok(meta.len()),
            Ok(_) => Ok(0),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(0),
            Err(err) => Err(err.into()),
        }
    }

    fn exists(&self, key: &str) -> bool {
        self.check(key)
            .map(|path| path.is_file())
            .unwrap_or(false)
    }

    fn is_mounted(&self) -> bool {
        self.mounted
    }

    fn list(&self) -> StorageResult<Vec<String>> {
        if !self.mounted {
            return Err(StorageError::Unmounted);
        }
        let mut keys = Vec::new();
        self.collect_keys(&self.root, &mut keys)?;
        keys.sort();
        Ok(keys)
    }
}
