//! Records and key rules.

use crate::error::{MapError, Result};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::LazyLock;

static KEY_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-][A-Za-z0-9_.-]{0,199}$").expect("valid regex"));

/// Check that a key is usable by every backend.
///
/// Keys become file names and text-table fields, so they are limited to
/// `[A-Za-z0-9_.-]`, at most 200 characters, and may not start with `.`
/// (those names are reserved for lock, temp and metadata files).
pub fn validate_key(key: &str) -> Result<()> {
    if KEY_PATTERN.is_match(key) {
        Ok(())
    } else {
        Err(MapError::UserError(format!(
            "invalid key '{}': keys use [A-Za-z0-9_.-], at most 200 chars, and must not start with '.'",
            key
        )))
    }
}

/// One stored entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Unique identifier within the map.
    pub key: String,

    /// Digest of `value`, or of the signature object supplied at write time.
    pub signature: String,

    /// The payload.
    pub value: Value,

    /// Free text attached by queue producers (empty for plain map writes).
    #[serde(default)]
    pub message: String,

    /// When the record was written.
    pub timestamp: DateTime<Utc>,
}

impl Record {
    /// Create a record stamped with the current time.
    pub fn new(
        key: impl Into<String>,
        value: Value,
        signature: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            signature: signature.into(),
            value,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }

    /// Rebuild a record from its header and payload.
    pub fn from_parts(header: RecordHeader, value: Value) -> Self {
        Self {
            key: header.key,
            signature: header.signature,
            value,
            message: header.message,
            timestamp: header.timestamp,
        }
    }

    /// Decode the payload into a concrete type.
    pub fn value_as<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(self.value.clone()).map_err(|e| {
            MapError::Serialization(format!("failed to decode record '{}': {}", self.key, e))
        })
    }

    /// Everything but the payload.
    pub fn header(&self) -> RecordHeader {
        RecordHeader {
            key: self.key.clone(),
            signature: self.signature.clone(),
            message: self.message.clone(),
            timestamp: self.timestamp,
        }
    }
}

/// The cheap part of a record: enough for listing and signature checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordHeader {
    pub key: String,
    pub signature: String,
    #[serde(default)]
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_ordinary_keys() {
        for key in ["a", "job-1", "00000001712345678901-abcd1234", "x_y.z", "-dash"] {
            validate_key(key).unwrap();
        }
    }

    #[test]
    fn rejects_unsafe_keys() {
        let long = "k".repeat(201);
        for key in ["", ".lock", "a/b", "a\tb", "a\nb", "../up", "sp ace", long.as_str()] {
            assert!(validate_key(key).is_err(), "key {:?} should be rejected", key);
        }
    }

    #[test]
    fn header_and_parts_round_trip() {
        let record = Record::new("k", json!({"n": 1}), "sig", "msg");
        let rebuilt = Record::from_parts(record.header(), record.value.clone());
        assert_eq!(rebuilt, record);
    }

    #[test]
    fn value_as_reports_type_mismatch() {
        let record = Record::new("k", json!("text"), "sig", "");
        let err = record.value_as::<u32>().unwrap_err();
        assert!(matches!(err, MapError::Serialization(_)));
        assert_eq!(record.value_as::<String>().unwrap(), "text");
    }
}
