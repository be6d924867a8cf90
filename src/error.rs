//! Error types for mapq.
//!
//! Uses thiserror for derive macros. Every variant maps to a CLI exit code;
//! a missing key is never an error (it is a `None`/`false` result).

use crate::exit_codes;
use std::fmt;
use std::path::Path;
use thiserror::Error;

/// Why a map is no longer usable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidReason {
    /// `destroy()` was called on this map (or on another instance sharing its storage).
    Destroyed,
    /// The integrity check found damaged storage.
    Corrupted(String),
}

impl fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvalidReason::Destroyed => write!(f, "map has been destroyed"),
            InvalidReason::Corrupted(detail) => write!(f, "storage is corrupted: {}", detail),
        }
    }
}

/// Main error type for map, lock and queue operations.
#[derive(Error, Debug)]
pub enum MapError {
    /// The exclusive lock was not acquired within the caller's budget.
    #[error(
        "timed out after {waited_ms}ms waiting for lock '{resource}' (owner: {owner}, held by: {})",
        .holder.as_deref().unwrap_or("unknown")
    )]
    LockTimeout {
        resource: String,
        owner: String,
        waited_ms: u64,
        holder: Option<String>,
    },

    /// Operation attempted on a destroyed or corrupted map.
    #[error("map '{name}' is invalid: {reason}")]
    InvalidMap { name: String, reason: InvalidReason },

    /// The storage medium could not be reached.
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    /// A payload could not be encoded or decoded.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// Bad arguments, keys or configuration.
    #[error("{0}")]
    UserError(String),
}

impl MapError {
    /// Returns the appropriate exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            MapError::LockTimeout { .. } => exit_codes::LOCK_FAILURE,
            MapError::InvalidMap { .. } => exit_codes::INVALID_MAP,
            MapError::BackendUnavailable(_) => exit_codes::BACKEND_UNAVAILABLE,
            MapError::Serialization(_) => exit_codes::SERIALIZATION_FAILURE,
            MapError::UserError(_) => exit_codes::USER_ERROR,
        }
    }

    /// Build the error returned for any operation on a destroyed map.
    pub fn destroyed(name: &str) -> Self {
        MapError::InvalidMap {
            name: name.to_string(),
            reason: InvalidReason::Destroyed,
        }
    }

    /// Build the error returned when an integrity check fails.
    pub fn corrupted(name: &str, detail: impl Into<String>) -> Self {
        MapError::InvalidMap {
            name: name.to_string(),
            reason: InvalidReason::Corrupted(detail.into()),
        }
    }

    /// Wrap a filesystem error with the action and path that triggered it.
    pub fn io(action: &str, path: &Path, err: std::io::Error) -> Self {
        MapError::BackendUnavailable(format!("failed to {} '{}': {}", action, path.display(), err))
    }

    /// Whether this error says the map was destroyed.
    pub fn is_destroyed(&self) -> bool {
        matches!(
            self,
            MapError::InvalidMap {
                reason: InvalidReason::Destroyed,
                ..
            }
        )
    }
}

impl From<serde_json::Error> for MapError {
    fn from(err: serde_json::Error) -> Self {
        MapError::Serialization(err.to_string())
    }
}

/// Result type alias for mapq operations.
pub type Result<T> = std::result::Result<T, MapError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_timeout_has_correct_exit_code() {
        let err = MapError::LockTimeout {
            resource: "/tmp/q/.lock".to_string(),
            owner: "a".to_string(),
            waited_ms: 100,
            holder: Some("b".to_string()),
        };
        assert_eq!(err.exit_code(), exit_codes::LOCK_FAILURE);
        assert!(err.to_string().contains("held by: b"));
    }

    #[test]
    fn invalid_map_has_correct_exit_code() {
        let err = MapError::destroyed("jobs");
        assert_eq!(err.exit_code(), exit_codes::INVALID_MAP);
        assert!(err.is_destroyed());
        assert_eq!(err.to_string(), "map 'jobs' is invalid: map has been destroyed");
    }

    #[test]
    fn corrupted_is_invalid_but_not_destroyed() {
        let err = MapError::corrupted("jobs", "bad line 3");
        assert_eq!(err.exit_code(), exit_codes::INVALID_MAP);
        assert!(!err.is_destroyed());
        assert!(err.to_string().contains("bad line 3"));
    }

    #[test]
    fn backend_and_serialization_codes_differ() {
        let backend = MapError::BackendUnavailable("connection refused".to_string());
        let serial = MapError::Serialization("eof".to_string());
        assert_eq!(backend.exit_code(), exit_codes::BACKEND_UNAVAILABLE);
        assert_eq!(serial.exit_code(), exit_codes::SERIALIZATION_FAILURE);
    }

    #[test]
    fn serde_json_errors_become_serialization_errors() {
        let err: MapError = serde_json::from_str::<serde_json::Value>("{").unwrap_err().into();
        assert!(matches!(err, MapError::Serialization(_)));
    }

    #[test]
    fn io_errors_name_the_path() {
        let err = MapError::io(
            "read",
            Path::new("/nope/x.json"),
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(matches!(err, MapError::BackendUnavailable(_)));
        assert!(err.to_string().contains("/nope/x.json"));
    }
}
