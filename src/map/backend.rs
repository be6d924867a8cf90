//! The storage backend contract.

use super::record::{Record, RecordHeader};
use crate::error::Result;
use crate::locks::{ExclusiveLock, LockSettings};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// Which storage medium a backend uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Process-local hash map.
    Memory,
    /// One JSON file per key (default).
    #[default]
    File,
    /// One zstd-compressed file per key.
    Compressed,
    /// One shared tab-delimited text file.
    Text,
    /// Redis server.
    Redis,
}

impl BackendKind {
    /// Parse a backend kind from a string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "memory" => Some(Self::Memory),
            "file" => Some(Self::File),
            "compressed" => Some(Self::Compressed),
            "text" => Some(Self::Text),
            "redis" => Some(Self::Redis),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::File => "file",
            Self::Compressed => "compressed",
            Self::Text => "text",
            Self::Redis => "redis",
        }
    }

    /// Whether several processes can share this backend.
    pub fn is_shared(&self) -> bool {
        !matches!(self, Self::Memory)
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw persistence primitives behind a [`Map`](super::Map).
///
/// Backends never take the map lock themselves: the map calls the mutating
/// primitives only while holding it. Every method must leave the store with
/// whole records only.
pub trait StorageBackend: Send + Sync + Debug {
    fn kind(&self) -> BackendKind;

    /// Where the data lives (directory, URL, handle description).
    fn location(&self) -> String;

    /// Backend setup (create directories, open connections). Idempotent.
    fn connect(&self) -> Result<()>;

    /// Whether the storage root is still present.
    fn exists(&self) -> Result<bool>;

    fn get_raw(&self, key: &str) -> Result<Option<Record>>;

    /// Insert or replace a record.
    fn set_raw(&self, record: &Record) -> Result<()>;

    /// Remove keys; missing keys are ignored.
    fn remove_raw(&self, keys: &[String]) -> Result<()>;

    /// Headers of all records, in any order.
    fn list_keys_raw(&self) -> Result<Vec<RecordHeader>>;

    /// Integrity check; returns a description of every problem found.
    fn validate_raw(&self) -> Result<Vec<String>>;

    /// Remove all persisted state.
    fn destroy_raw(&self) -> Result<()>;

    /// Read a named counter (0 when never written).
    fn read_counter(&self, name: &str) -> Result<u64>;

    fn write_counter(&self, name: &str, value: u64) -> Result<()>;

    /// The lock this backend uses when the map is not given one.
    fn default_lock(&self, owner: &str, settings: &LockSettings) -> Box<dyn ExclusiveLock>;
}
