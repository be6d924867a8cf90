//! StoreConfig struct definition and default implementation.

use super::types::*;
use crate::map::BackendKind;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration of one map or queue.
///
/// This struct represents the contents of `mapq.yaml`.
/// Unknown fields in the YAML are ignored for forward compatibility.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    // =========================================================================
    // Store settings
    // =========================================================================
    /// Map / queue name (default: "jobs").
    #[serde(default = "default_name")]
    pub name: String,

    /// Storage backend.
    #[serde(default)]
    pub backend: BackendKind,

    /// Directory for filesystem backends, relative to the config file.
    #[serde(default = "default_path")]
    pub path: String,

    /// Server URL for the redis backend.
    #[serde(default = "default_redis_url")]
    pub redis_url: String,

    /// zstd level for the compressed backend (1-22).
    #[serde(default = "default_compression_level")]
    pub compression_level: i32,

    // =========================================================================
    // Lock settings
    // =========================================================================
    /// How long a mutation waits for the lock.
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,

    /// Pause between lock attempts.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Age after which a held lock counts as abandoned (0 disables takeover).
    #[serde(default = "default_lock_stale_minutes")]
    pub lock_stale_minutes: u32,

    /// Directory relative paths are resolved against (the config file's directory).
    #[serde(skip)]
    pub base_dir: Option<PathBuf>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            backend: BackendKind::default(),
            path: default_path(),
            redis_url: default_redis_url(),
            compression_level: default_compression_level(),
            lock_timeout_ms: default_lock_timeout_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            lock_stale_minutes: default_lock_stale_minutes(),
            base_dir: None,
        }
    }
}
