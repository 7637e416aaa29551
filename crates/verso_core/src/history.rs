//! Bounded set of retained historical versions.

use std::collections::BTreeSet;

/// The versions of a key whose snapshots are still retained.
///
/// An ordered set with a capacity. Version numbers are assigned in
/// increasing order at write time, so the smallest member is always the
/// oldest snapshot and the one evicted first.
///
/// Insertion never grows the set past its capacity: when full,
/// [`VersionHistory::try_insert`] hands back the version that must be
/// evicted first. A history decoded from a record written with a larger
/// capacity can start out over capacity; [`VersionHistory::is_over_capacity`]
/// reports that so cleanup can trim it.
///
/// `0` is the empty-slot sentinel of the persisted record and is never a
/// member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionHistory {
    capacity: usize,
    versions: BTreeSet<u32>,
}

/// Returned by [`VersionHistory::try_insert`] when the history is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryFull {
    /// The oldest retained version, which must be evicted to make room.
    pub oldest: u32,
}

impl VersionHistory {
    /// Creates an empty history holding at most `capacity` versions.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            versions: BTreeSet::new(),
        }
    }

    /// Creates a history from already-retained versions.
    ///
    /// Zero entries are skipped. The result may exceed `capacity`.
    #[must_use]
    pub fn from_versions(capacity: usize, versions: impl IntoIterator<Item = u32>) -> Self {
        Self {
            capacity: capacity.max(1),
            versions: versions.into_iter().filter(|&v| v != 0).collect(),
        }
    }

    /// Maximum number of versions insertion allows.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of retained versions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.versions.len()
    }

    /// Returns true if no version is retained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }

    /// Returns true if another insertion requires an eviction first.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.versions.len() >= self.capacity
    }

    /// Returns true if more versions are retained than the capacity allows.
    #[must_use]
    pub fn is_over_capacity(&self) -> bool {
        self.versions.len() > self.capacity
    }

    /// Returns true if `version` is retained.
    #[must_use]
    pub fn contains(&self, version: u32) -> bool {
        self.versions.contains(&version)
    }

    /// The oldest retained version.
    #[must_use]
    pub fn oldest(&self) -> Option<u32> {
        self.versions.first().copied()
    }

    /// The newest retained version.
    #[must_use]
    pub fn newest(&self) -> Option<u32> {
        self.versions.last().copied()
    }

    /// Retained versions, oldest first.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = u32> + '_ {
        self.versions.iter().copied()
    }

    /// Adds `version` to the history.
    ///
    /// Returns `Ok(true)` if it was added and `Ok(false)` if it was already
    /// retained (or is the `0` sentinel).
    ///
    /// # Errors
    ///
    /// Returns [`HistoryFull`] naming the version to evict when the history
    /// is at capacity. The history is unchanged.
    pub fn try_insert(&mut self, version: u32) -> Result<bool, HistoryFull> {
        if version == 0 || self.versions.contains(&version) {
            return Ok(false);
        }
        if let Some(oldest) = self.oldest().filter(|_| self.is_full()) {
            return Err(HistoryFull { oldest });
        }
        Ok(self.versions.insert(version))
    }

    /// Removes `version`. Returns true if it was retained.
    pub fn remove(&mut self, version: u32) -> bool {
        self.versions.remove(&version)
    }
}
