//! Key encoding utilities for `RocksDB`.
//!
//! This module provides functions for encoding and decoding keys used in
//! column families.

use quota_core::{LogEntryId, ResourceCategory, UserId};

use crate::error::{Result, StoreError};

/// Separator between variable-length key segments.
const SEP: u8 = 0;

/// Create a plan key from a tier name.
#[must_use]
pub fn plan_key(tier: &str) -> Vec<u8> {
    tier.as_bytes().to_vec()
}

/// Create a subscription key from a user ID.
#[must_use]
pub fn subscription_key(user_id: &UserId) -> Vec<u8> {
    user_id.as_bytes().to_vec()
}

/// Create a usage summary key.
///
/// Format: `user_id (16 bytes) || period_key`
#[must_use]
pub fn summary_key(user_id: &UserId, period_key: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(16 + period_key.len());
    key.extend_from_slice(user_id.as_bytes());
    key.extend_from_slice(period_key.as_bytes());
    key
}

/// Create a log entry key from a log entry ID.
#[must_use]
pub fn log_entry_key(id: &LogEntryId) -> Vec<u8> {
    id.to_bytes().to_vec()
}

/// Create a user-log index key.
///
/// Format: `user_id (16 bytes) || log_entry_id (16 bytes)`
///
/// Since ULIDs are time-ordered, a user's log entries sort chronologically.
#[must_use]
pub fn user_log_key(user_id: &UserId, id: &LogEntryId) -> Vec<u8> {
    let mut key = Vec::with_capacity(32);
    key.extend_from_slice(user_id.as_bytes());
    key.extend_from_slice(&id.to_bytes());
    key
}

/// Create a prefix for iterating all log entries for a user.
#[must_use]
pub fn user_log_prefix(user_id: &UserId) -> Vec<u8> {
    user_id.as_bytes().to_vec()
}

/// Extract the log entry ID from a user-log index key.
///
/// # Errors
///
/// Returns [`StoreError::Database`] if the key is shorter than the 32-byte
/// index format. A truncated key means the index row is corrupt; the read
/// path surfaces that instead of panicking.
pub fn extract_log_entry_id_from_user_key(key: &[u8]) -> Result<LogEntryId> {
    let bytes: [u8; 16] = key
        .get(16..32)
        .and_then(|slice| slice.try_into().ok())
        .ok_or_else(|| {
            StoreError::Database(format!("malformed user-log key: {} bytes", key.len()))
        })?;
    LogEntryId::from_bytes(bytes)
        .map_err(|e| StoreError::Database(format!("malformed user-log key: {e}")))
}

/// Create an alert key.
///
/// Format: `user_id (16 bytes) || period_key || 0x00 || category || 0x00 ||
/// threshold (1 byte)`
#[must_use]
pub fn alert_key(
    user_id: &UserId,
    period_key: &str,
    category: &ResourceCategory,
    threshold: u8,
) -> Vec<u8> {
    let category = category.as_str();
    let mut key = Vec::with_capacity(16 + period_key.len() + category.len() + 3);
    key.extend_from_slice(user_id.as_bytes());
    key.extend_from_slice(period_key.as_bytes());
    key.push(SEP);
    key.extend_from_slice(category.as_bytes());
    key.push(SEP);
    key.push(threshold);
    key
}

/// Create a prefix for iterating all alerts for a (user, period).
#[must_use]
pub fn alerts_prefix(user_id: &UserId, period_key: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(16 + period_key.len() + 1);
    key.extend_from_slice(user_id.as_bytes());
    key.extend_from_slice(period_key.as_bytes());
    key.push(SEP);
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscription_key_length() {
        let user_id = UserId::generate();
        let key = subscription_key(&user_id);
        assert_eq!(key.len(), 16);
    }

    #[test]
    fn summary_key_format() {
        let user_id = UserId::generate();
        let key = summary_key(&user_id, "2026-08");
        assert_eq!(key.len(), 23);
        assert_eq!(&key[..16], user_id.as_bytes());
        assert_eq!(&key[16..], b"2026-08");
    }

    #[test]
    fn user_log_key_format() {
        let user_id = UserId::generate();
        let id = LogEntryId::generate();
        let key = user_log_key(&user_id, &id);

        assert_eq!(key.len(), 32);
        assert_eq!(&key[..16], user_id.as_bytes());
        assert_eq!(&key[16..], id.to_bytes());
    }

    #[test]
    fn extract_log_entry_id_roundtrip() {
        let user_id = UserId::generate();
        let id = LogEntryId::generate();
        let key = user_log_key(&user_id, &id);

        let extracted = extract_log_entry_id_from_user_key(&key).unwrap();
        assert_eq!(extracted, id);
    }

    #[test]
    fn truncated_user_log_key_is_an_error() {
        let user_id = UserId::generate();
        let err = extract_log_entry_id_from_user_key(user_id.as_bytes()).unwrap_err();
        assert!(matches!(err, StoreError::Database(_)));
    }

    #[test]
    fn alert_key_is_prefixed_by_alerts_prefix() {
        let user_id = UserId::generate();
        let key = alert_key(&user_id, "2026-08", &ResourceCategory::TextGeneration, 80);
        let prefix = alerts_prefix(&user_id, "2026-08");

        assert!(key.starts_with(&prefix));
        assert_eq!(*key.last().unwrap(), 80);
    }

    #[test]
    fn alert_keys_distinct_per_threshold() {
        let user_id = UserId::generate();
        let k80 = alert_key(&user_id, "2026-08", &ResourceCategory::TextGeneration, 80);
        let k90 = alert_key(&user_id, "2026-08", &ResourceCategory::TextGeneration, 90);
        assert_ne!(k80, k90);
    }
}
