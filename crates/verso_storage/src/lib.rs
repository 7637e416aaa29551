//! # Verso Storage
//!
//! Flat keyed byte-store backends for Verso.
//!
//! This crate provides the lowest-level storage abstraction for Verso.
//! Storage backends are **opaque byte stores** keyed by path-like strings.
//! They do not interpret the data they store.
//!
//! ## Design Principles
//!
//! - Backends are simple whole-resource stores (read, write, delete, size)
//! - No knowledge of version metadata, snapshots, or sidecar naming
//! - Must be `Send + Sync` for concurrent access
//! - Verso owns all versioning interpretation
//!
//! ## Available Backends
//!
//! - [`InMemoryBackend`] - For testing and ephemeral storage
//! - [`FileBackend`] - A directory on the host filesystem used as mount point
//!
//! ## Example
//!
//! ```rust
//! use verso_storage::{StorageBackend, InMemoryBackend};
//!
//! let mut backend = InMemoryBackend::new();
//! backend.write("config/wifi.json", b"hello world").unwrap();
//! let data = backend.read("config/wifi.json", 5).unwrap();
//! assert_eq!(&data, b"hello");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod key;
mod memory;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use key::{normalize_key, validate_key, MAX_KEY_LEN};
pub use memory::InMemoryBackend;
