//! Store configuration.

use std::time::Duration;

/// Number of historical snapshots retained per key unless configured.
pub const DEFAULT_MAX_HISTORY: usize = 5;

/// What a write does when archiving the content it replaces fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArchivePolicy {
    /// Log the failure and let the write proceed. The version counter still
    /// advances, so the replaced content is not retrievable.
    #[default]
    BestEffort,
    /// Refuse the write with [`crate::CoreError::ArchiveFailed`] and leave
    /// the key untouched.
    FailClosed,
}

/// What loading does with a sidecar that cannot be decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MetadataRecovery {
    /// Treat the key as never versioned and start again from version 0.
    /// Indistinguishable from data loss; every reset is logged and counted.
    #[default]
    Reset,
    /// Surface [`crate::CoreError::CorruptMetadata`] to the caller.
    Fail,
}

/// Configuration for a [`crate::VersionedStore`].
///
/// Fixed at construction; there is no per-key override.
#[derive(Debug, Clone)]
pub struct Config {
    /// Maximum number of historical snapshots retained per key.
    pub max_history: usize,

    /// How long an operation waits for the store lock before failing
    /// with [`crate::CoreError::Busy`].
    pub lock_timeout: Duration,

    /// Behaviour of a write whose archive step fails.
    pub archive_policy: ArchivePolicy,

    /// Behaviour when a metadata sidecar is malformed.
    pub metadata_recovery: MetadataRecovery,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_history: DEFAULT_MAX_HISTORY,
            lock_timeout: Duration::from_millis(1000),
            archive_policy: ArchivePolicy::BestEffort,
            metadata_recovery: MetadataRecovery::Reset,
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the number of retained snapshots per key.
    ///
    /// Clamped to `1..=`[`crate::MAX_SLOTS`].
    #[must_use]
    pub fn max_history(mut self, depth: usize) -> Self {
        self.max_history = depth.clamp(1, crate::metadata::MAX_SLOTS);
        self
    }

    /// Sets the lock acquisition timeout.
    #[must_use]
    pub const fn lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// Sets the archive failure policy.
    #[must_use]
    pub const fn archive_policy(mut self, policy: ArchivePolicy) -> Self {
        self.archive_policy = policy;
        self
    }

    /// Sets the corrupt metadata policy.
    #[must_use]
    pub const fn metadata_recovery(mut self, recovery: MetadataRecovery) -> Self {
        self.metadata_recovery = recovery;
        self
    }
}
