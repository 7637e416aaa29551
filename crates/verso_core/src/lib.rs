//! # Verso Core
//!
//! Automatic version history over a flat keyed byte store.
//!
//! Every write of a key first archives the bytes it is about to replace as a
//! numbered snapshot, then advances the key's version counter. History is
//! bounded: once `max_history` snapshots are retained, the oldest is evicted
//! before a new one is indexed.
//!
//! This crate provides:
//! - [`VersionedStore`], the locked façade every operation goes through
//! - The fixed-layout [`VersionMetadata`] sidecar record and its codec
//! - [`VersionHistory`], the bounded ordered set of retained versions
//! - [`checksum`], the CRC-32 fingerprint stored in metadata
//!
//! ## Persisted layout
//!
//! ```text
//! K          canonical resource (current content)
//! K.meta     metadata sidecar (fixed binary record)
//! K.v<N>     snapshot of version N (raw bytes, no header)
//! ```
//!
//! ## Example
//!
//! ```rust
//! use verso_core::{Config, VersionedStore};
//! use verso_storage::InMemoryBackend;
//!
//! let store = VersionedStore::new(InMemoryBackend::new(), Config::default());
//! store.write("a", b"v1").unwrap();
//! store.write("a", b"v22").unwrap();
//!
//! assert_eq!(store.get_version("a").unwrap(), 2);
//! assert_eq!(store.read_version("a", 1).unwrap(), b"v1");
//!
//! // Restoring creates a new version with the old content.
//! store.restore("a", 1).unwrap();
//! assert_eq!(store.get_version("a").unwrap(), 3);
//! assert_eq!(store.read("a").unwrap(), b"v1");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod checksum;
mod config;
mod engine;
mod error;
mod history;
mod metadata;
mod stats;
mod store;

pub use checksum::checksum;
pub use config::{ArchivePolicy, Config, MetadataRecovery, DEFAULT_MAX_HISTORY};
pub use engine::VersionInfo;
pub use error::{CoreError, CoreResult};
pub use history::{HistoryFull, VersionHistory};
pub use metadata::{
    is_reserved_key, metadata_key, snapshot_key, VersionMetadata, HEADER_SIZE, MAX_SLOTS,
    METADATA_SUFFIX, SNAPSHOT_INFIX,
};
pub use stats::{StatsSnapshot, VersioningStats};
pub use store::VersionedStore;

/// Crate version, reported by the CLI.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
