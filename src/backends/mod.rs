//! Storage backends.
//!
//! | Backend | Storage | Lock |
//! |---|---|---|
//! | [`MemoryBackend`] | shared [`MemoryHandle`] | [`MemoryLock`] |
//! | [`FileBackend`] | `<dir>/<key>.json` | [`FileLock`] on `<dir>/.lock` |
//! | [`FileBackend::compressed`] | `<dir>/<key>.zst` | [`FileLock`] on `<dir>/.lock` |
//! | [`TextBackend`] | `<dir>/table.tsv` | [`FileLock`] on `<dir>/.lock` |
//! | [`RedisBackend`] | `mapq:<name>:*` hashes | [`RedisLock`] |
//!
//! Inside a backend directory, names starting with `.` are reserved for the
//! lock file, counters and temp files.

pub mod compressed;
mod file;
mod memory;
mod meta;
mod redis_backend;
mod text;

pub use file::{BodyCodec, FileBackend};
pub use memory::{MemoryBackend, MemoryHandle, MemoryLock};
pub use meta::META_FILE;
pub use redis_backend::{RedisBackend, RedisConnector, RedisLock};
pub use text::{TABLE_FILE, TextBackend, escape, unescape};

pub use crate::locks::FileLock;
pub use crate::map::BackendKind;

use crate::locks::{ExclusiveLock, LockSettings};
use std::path::Path;

/// File name of the lock inside a backend directory.
pub const LOCK_FILE: &str = ".lock";

/// The lock shared by every map stored in `dir`.
pub(crate) fn directory_lock(
    dir: &Path,
    owner: &str,
    settings: &LockSettings,
) -> Box<dyn ExclusiveLock> {
    Box::new(
        FileLock::new(dir.join(LOCK_FILE), owner)
            .with_stale_after(settings.stale_after)
            .in_existing_directory(),
    )
}
