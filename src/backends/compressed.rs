//! zstd body codec for the compressed backend.
//!
//! Only record bodies are compressed. The header line stays plain JSON so
//! listing and signature checks never decompress anything.

use crate::error::{MapError, Result};
use serde_json::Value;

/// Lowest accepted zstd level.
pub const MIN_LEVEL: i32 = 1;

/// Highest accepted zstd level.
pub const MAX_LEVEL: i32 = 22;

/// Level used when none is configured.
pub const DEFAULT_LEVEL: i32 = 3;

/// Whether `level` is a zstd level the backend accepts.
pub fn is_valid_level(level: i32) -> bool {
    (MIN_LEVEL..=MAX_LEVEL).contains(&level)
}

/// Serialize and compress a record body.
pub fn compress_value(value: &Value, level: i32) -> Result<Vec<u8>> {
    let json = serde_json::to_vec(value)?;
    zstd::encode_all(json.as_slice(), level)
        .map_err(|e| MapError::Serialization(format!("zstd compression failed: {}", e)))
}

/// Decompress and parse a record body.
pub fn decompress_value(bytes: &[u8]) -> Result<Value> {
    let json = zstd::decode_all(bytes)
        .map_err(|e| MapError::Serialization(format!("zstd decompression failed: {}", e)))?;
    Ok(serde_json::from_slice(&json)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn repetitive_payloads_shrink() {
        let value = json!({ "rows": vec!["same row of data"; 500] });
        let plain = serde_json::to_vec(&value).unwrap();
        let packed = compress_value(&value, DEFAULT_LEVEL).unwrap();

        assert!(packed.len() < plain.len() / 4);
        assert_eq!(decompress_value(&packed).unwrap(), value);
    }

    #[test]
    fn garbage_is_a_serialization_error() {
        let err = decompress_value(b"not zstd at all").unwrap_err();
        assert!(matches!(err, MapError::Serialization(_)));
    }

    #[test]
    fn level_bounds() {
        assert!(is_valid_level(MIN_LEVEL));
        assert!(is_valid_level(MAX_LEVEL));
        assert!(!is_valid_level(0));
        assert!(!is_valid_level(23));
    }
}
