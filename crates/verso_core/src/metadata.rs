//! Version metadata sidecar record.

use crate::error::{CoreError, CoreResult};
use crate::history::VersionHistory;
use std::time::{SystemTime, UNIX_EPOCH};
use verso_storage::{normalize_key, MAX_KEY_LEN};

/// Suffix appended to a key to name its metadata sidecar.
pub const METADATA_SUFFIX: &str = ".meta";

/// Infix between a key and a version number naming a snapshot.
pub const SNAPSHOT_INFIX: &str = ".v";

/// Bytes before the version slots: five little-endian `u32` fields.
pub const HEADER_SIZE: usize = 20;

/// Largest slot count a record may carry.
pub const MAX_SLOTS: usize = 1024;

/// Longest suffix versioning appends to a key (`".v4294967295"`).
const LONGEST_SUFFIX: usize = 12;

/// Returns the sidecar key for `key`.
#[must_use]
pub fn metadata_key(key: &str) -> String {
    format!("{}{METADATA_SUFFIX}", normalize_key(key))
}

/// Returns the snapshot key for version `version` of `key`.
#[must_use]
pub fn snapshot_key(key: &str, version: u32) -> String {
    format!("{}{SNAPSHOT_INFIX}{version}", normalize_key(key))
}

/// Parses a snapshot key back into its base key and version.
pub(crate) fn parse_snapshot_key(key: &str) -> Option<(&str, u32)> {
    let (base, digits) = key.rsplit_once(SNAPSHOT_INFIX)?;
    if base.is_empty() || digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok().map(|version| (base, version))
}

/// Returns true if `key` names a sidecar or snapshot rather than content.
#[must_use]
pub fn is_reserved_key(key: &str) -> bool {
    key.ends_with(METADATA_SUFFIX) || parse_snapshot_key(key).is_some()
}

/// Rejects user keys that would collide with versioning resources or leave
/// no room for the suffixes versioning appends.
pub(crate) fn validate_user_key(key: &str) -> CoreResult<()> {
    verso_storage::validate_key(key)?;
    if is_reserved_key(key) {
        return Err(CoreError::invalid_key(
            key,
            "ends with a suffix reserved for version metadata or snapshots",
        ));
    }
    if normalize_key(key).len() > MAX_KEY_LEN - LONGEST_SUFFIX {
        return Err(CoreError::invalid_key(
            key,
            format!("longer than {} bytes", MAX_KEY_LEN - LONGEST_SUFFIX),
        ));
    }
    Ok(())
}

/// Seconds since the Unix epoch, saturating at `u32::MAX`.
pub(crate) fn unix_timestamp() -> u32 {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    u32::try_from(secs).unwrap_or(u32::MAX)
}

/// Version state of one key.
///
/// ## Binary Format
///
/// All fields little-endian `u32`:
///
/// ```text
/// | current_version | timestamp | file_size | checksum | version_count | versions[slots] |
/// ```
///
/// `versions[0..version_count)` holds the retained versions in ascending
/// order; the remaining slots are `0`. Retained versions are older than
/// `current_version`, except right after a standalone archive, which
/// indexes the current version ahead of the next write. A record is written with
/// `max_history` slots but any slot count up to [`MAX_SLOTS`] decodes, so
/// sidecars written under a larger history depth stay readable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionMetadata {
    /// Version of the current content. `0` means never written.
    pub current_version: u32,
    /// Seconds since the Unix epoch of the last write.
    pub timestamp: u32,
    /// Size of the current content in bytes.
    pub file_size: u32,
    /// CRC-32 of the current content.
    pub checksum: u32,
    /// Retained historical versions.
    pub history: VersionHistory,
}

impl VersionMetadata {
    /// Creates the record of a key that has never been written.
    #[must_use]
    pub fn new(max_history: usize) -> Self {
        Self {
            current_version: 0,
            timestamp: 0,
            file_size: 0,
            checksum: 0,
            history: VersionHistory::new(max_history),
        }
    }

    /// Number of retained historical versions.
    #[must_use]
    pub fn version_count(&self) -> u32 {
        u32::try_from(self.history.len()).unwrap_or(u32::MAX)
    }

    /// Size in bytes of the encoded record.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        HEADER_SIZE + 4 * self.slots()
    }

    fn slots(&self) -> usize {
        self.history.capacity().max(self.history.len())
    }

    /// Encodes the record.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.encoded_len());

        buf.extend_from_slice(&self.current_version.to_le_bytes());
        buf.extend_from_slice(&self.timestamp.to_le_bytes());
        buf.extend_from_slice(&self.file_size.to_le_bytes());
        buf.extend_from_slice(&self.checksum.to_le_bytes());
        buf.extend_from_slice(&self.version_count().to_le_bytes());

        for version in self.history.iter() {
            buf.extend_from_slice(&version.to_le_bytes());
        }
        for _ in self.history.len()..self.slots() {
            buf.extend_from_slice(&0u32.to_le_bytes());
        }

        buf
    }

    /// Decodes the sidecar record of `key`.
    ///
    /// The decoded history has capacity `max_history`, which may be smaller
    /// than the number of retained versions in the record.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::CorruptMetadata`] if the length is not a whole
    /// number of slots, `version_count` exceeds the slot count, the prefix
    /// holds a zero, duplicate or newer-than-current version, or a tail
    /// slot is non-zero.
    pub fn decode(key: &str, data: &[u8], max_history: usize) -> CoreResult<Self> {
        if data.len() < HEADER_SIZE || (data.len() - HEADER_SIZE) % 4 != 0 {
            return Err(CoreError::corrupt_metadata(
                key,
                format!("record length {} is not header plus whole slots", data.len()),
            ));
        }
        let slots = (data.len() - HEADER_SIZE) / 4;
        if slots == 0 || slots > MAX_SLOTS {
            return Err(CoreError::corrupt_metadata(
                key,
                format!("record has {slots} slots"),
            ));
        }

        let words: Vec<u32> = data
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        let (header, versions) = words.split_at(HEADER_SIZE / 4);
        let [current_version, timestamp, file_size, checksum, version_count] =
            [header[0], header[1], header[2], header[3], header[4]];

        let count = version_count as usize;
        if count > slots {
            return Err(CoreError::corrupt_metadata(
                key,
                format!("version_count {count} exceeds {slots} slots"),
            ));
        }

        let (retained, tail) = versions.split_at(count);
        if tail.iter().any(|&v| v != 0) {
            return Err(CoreError::corrupt_metadata(key, "non-zero unused slot"));
        }
        if retained.contains(&0) {
            return Err(CoreError::corrupt_metadata(
                key,
                "empty slot inside the retained versions",
            ));
        }
        if let Some(&bad) = retained.iter().find(|&&v| v > current_version) {
            return Err(CoreError::corrupt_metadata(
                key,
                format!("retained version {bad} is newer than current {current_version}"),
            ));
        }

        let history = VersionHistory::from_versions(max_history, retained.iter().copied());
        if history.len() != count {
            return Err(CoreError::corrupt_metadata(key, "duplicate retained version"));
        }

        Ok(Self {
            current_version,
            timestamp,
            file_size,
            checksum,
            history,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> VersionMetadata {
        let mut meta = VersionMetadata::new(5);
        meta.current_version = 9;
        meta.timestamp = 1_700_000_000;
        meta.file_size = 3;
        meta.checksum = 0xDEAD_BEEF;
        for v in [8, 5, 7] {
            meta.history.try_insert(v).unwrap();
        }
        meta
    }

    #[test]
    fn fresh_record_is_never_written() {
        let meta = VersionMetadata::new(5);
        assert_eq!(meta.current_version, 0);
        assert_eq!(meta.version_count(), 0);
        assert_eq!(meta.encoded_len(), 40);
    }

    #[test]
    fn encode_layout_is_fixed() {
        let encoded = sample().encode();
        assert_eq!(encoded.len(), HEADER_SIZE + 5 * 4);
        assert_eq!(&encoded[0..4], &9u32.to_le_bytes());
        assert_eq!(&encoded[16..20], &3u32.to_le_bytes());
        // Retained versions ascending, zero-filled tail
        assert_eq!(&encoded[20..24], &5u32.to_le_bytes());
        assert_eq!(&encoded[24..28], &7u32.to_le_bytes());
        assert_eq!(&encoded[28..32], &8u32.to_le_bytes());
        assert_eq!(&encoded[32..40], &[0u8; 8]);
    }

    #[test]
    fn encode_decode_roundtrip() {
        let meta = sample();
        let decoded = VersionMetadata::decode("k", &meta.encode(), 5).unwrap();
        assert_eq!(decoded, meta);
    }

    #[test]
    fn decode_larger_record_keeps_all_versions() {
        let mut wide = VersionMetadata::new(8);
        wide.current_version = 10;
        for v in 2..10 {
            wide.history.try_insert(v).unwrap();
        }

        let decoded = VersionMetadata::decode("k", &wide.encode(), 5).unwrap();
        assert_eq!(decoded.version_count(), 8);
        assert_eq!(decoded.history.capacity(), 5);
        assert!(decoded.history.is_over_capacity());
        // Re-encoding never drops retained versions.
        assert_eq!(decoded.encoded_len(), HEADER_SIZE + 8 * 4);
    }

    #[test]
    fn decode_rejects_bad_lengths() {
        assert!(VersionMetadata::decode("k", &[], 5).is_err());
        assert!(VersionMetadata::decode("k", &[0u8; 19], 5).is_err());
        assert!(VersionMetadata::decode("k", &[0u8; 22], 5).is_err());
        assert!(VersionMetadata::decode("k", &[0u8; HEADER_SIZE], 5).is_err());
    }

    #[test]
    fn decode_rejects_inconsistent_records() {
        let base = sample().encode();

        let mut count_too_big = base.clone();
        count_too_big[16..20].copy_from_slice(&6u32.to_le_bytes());
        assert!(matches!(
            VersionMetadata::decode("k", &count_too_big, 5),
            Err(CoreError::CorruptMetadata { .. })
        ));

        let mut dirty_tail = base.clone();
        dirty_tail[36..40].copy_from_slice(&1u32.to_le_bytes());
        assert!(VersionMetadata::decode("k", &dirty_tail, 5).is_err());

        let mut newer = base.clone();
        newer[20..24].copy_from_slice(&10u32.to_le_bytes());
        assert!(VersionMetadata::decode("k", &newer, 5).is_err());

        let mut duplicate = base;
        duplicate[24..28].copy_from_slice(&5u32.to_le_bytes());
        assert!(VersionMetadata::decode("k", &duplicate, 5).is_err());
    }

    #[test]
    fn decode_errors_name_the_fault() {
        let base = sample().encode();

        let mut zero = base.clone();
        zero[20..24].copy_from_slice(&0u32.to_le_bytes());
        let err = VersionMetadata::decode("k", &zero, 5).unwrap_err();
        assert!(err.to_string().contains("empty slot"), "{err}");

        let mut newer = base;
        newer[20..24].copy_from_slice(&10u32.to_le_bytes());
        let err = VersionMetadata::decode("k", &newer, 5).unwrap_err();
        assert!(err.to_string().contains("newer than current 9"), "{err}");
    }

    #[test]
    fn resource_naming() {
        assert_eq!(metadata_key("a"), "a.meta");
        assert_eq!(metadata_key("/cfg/a"), "cfg/a.meta");
        assert_eq!(snapshot_key("a", 12), "a.v12");
        assert_eq!(parse_snapshot_key("cfg/a.v12"), Some(("cfg/a", 12)));
        assert_eq!(parse_snapshot_key("a.v"), None);
        assert_eq!(parse_snapshot_key("a.vx1"), None);
        assert_eq!(parse_snapshot_key(".v1"), None);
    }

    #[test]
    fn reserved_keys_are_rejected() {
        assert!(is_reserved_key("a.meta"));
        assert!(is_reserved_key("a.v3"));
        assert!(!is_reserved_key("a.v3.txt"));
        assert!(!is_reserved_key("a.video"));

        assert!(validate_user_key("a").is_ok());
        assert!(matches!(
            validate_user_key("a.meta"),
            Err(CoreError::InvalidKey { .. })
        ));
        assert!(validate_user_key(&"k".repeat(244)).is_err());
        assert!(validate_user_key(&"k".repeat(243)).is_ok());
    }
}
