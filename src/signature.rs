//! Content signatures.
//!
//! A signature is the lowercase hex SHA-256 of a value's compact JSON
//! serialization, taken after conversion to a `serde_json::Value` so object
//! keys are always in sorted order. Maps store it next to every record so existence and
//! equality checks never need to decode the payload.

use crate::error::Result;
use serde::Serialize;
use sha2::{Digest, Sha256};

/// Compute the signature of any serializable value.
pub fn digest<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    let canonical = serde_json::to_value(value)?;
    let bytes = serde_json::to_vec(&canonical)?;
    Ok(digest_bytes(&bytes))
}

/// Compute the signature of raw bytes.
pub fn digest_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Whether a string has the shape of a signature produced by [`digest`].
pub fn is_signature(s: &str) -> bool {
    s.len() == 64 && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}
