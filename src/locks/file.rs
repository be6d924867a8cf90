//! File-based exclusive lock.
//!
//! The lock file's entire content is either empty (unlocked) or exactly the
//! identity of the holder. Each access to the marker happens under an OS
//! advisory lock (`fd-lock`), so the check-then-write is atomic between
//! processes; the marker itself carries ownership between accesses.

use super::gate::ThreadGate;
use super::polling::{Attempt, poll_acquire};
use super::types::{LockInfo, is_stale_since};
use super::ExclusiveLock;
use crate::error::{MapError, Result};
use chrono::{DateTime, Utc};
use fd_lock::RwLock;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Cross-process lock backed by a marker file.
#[derive(Debug)]
pub struct FileLock {
    path: PathBuf,
    owner: String,
    stale_after: Option<Duration>,
    create_parent: bool,
    gate: ThreadGate,
}

impl FileLock {
    /// Create a lock on `path` for `owner`. Nothing touches disk until the first acquire.
    pub fn new(path: impl Into<PathBuf>, owner: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            owner: owner.into(),
            stale_after: None,
            create_parent: true,
            gate: ThreadGate::new(),
        }
    }

    /// Treat markers older than `stale_after` as abandoned.
    pub fn with_stale_after(mut self, stale_after: Option<Duration>) -> Self {
        self.stale_after = stale_after;
        self
    }

    /// Never create the lock file's directory.
    ///
    /// Used by store backends: the directory belongs to the store, and a
    /// destroyed store must not be brought back by a waiting contender.
    pub fn in_existing_directory(mut self) -> Self {
        self.create_parent = false;
        self
    }

    /// Path to the lock file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn try_take(&self) -> Result<Attempt> {
        if self.create_parent
            && let Some(parent) = self.path.parent()
            && !parent.exists()
        {
            fs::create_dir_all(parent)
                .map_err(|e| MapError::io("create lock directory", parent, e))?;
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)
            .map_err(|e| MapError::io("open lock file", &self.path, e))?;

        let mut os_lock = RwLock::new(file);
        let mut guard = match os_lock.try_write() {
            Ok(guard) => guard,
            Err(e) if e.kind() == ErrorKind::WouldBlock => return Ok(Attempt::Busy(None)),
            Err(e) => return Err(MapError::io("lock", &self.path, e)),
        };

        let holder = read_marker(&mut guard, &self.path)?;
        if holder.is_empty() || holder == self.owner {
            write_marker(&mut guard, &self.path, &self.owner)?;
            return Ok(Attempt::Taken);
        }

        if is_stale_since(marker_time(&guard, &self.path)?, self.stale_after) {
            warn!(
                path = %self.path.display(),
                stale_owner = %holder,
                owner = %self.owner,
                "taking over stale lock"
            );
            write_marker(&mut guard, &self.path, &self.owner)?;
            return Ok(Attempt::Taken);
        }

        Ok(Attempt::Busy(Some(holder)))
    }

    /// Empty the marker, but only if `expected` (when given) still holds it.
    fn clear_marker(&self, expected: Option<&str>) -> Result<()> {
        let file = match OpenOptions::new().read(true).write(true).open(&self.path) {
            Ok(file) => file,
            // Removed by destroy while held.
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(MapError::io("open lock file", &self.path, e)),
        };

        let mut os_lock = RwLock::new(file);
        let mut guard = os_lock
            .write()
            .map_err(|e| MapError::io("lock", &self.path, e))?;

        let holder = read_marker(&mut guard, &self.path)?;
        if let Some(expected) = expected
            && holder != expected
        {
            warn!(
                path = %self.path.display(),
                holder = %holder,
                owner = %expected,
                "lock marker changed hands while held; leaving it"
            );
            return Ok(());
        }

        guard
            .set_len(0)
            .and_then(|()| guard.sync_all())
            .map_err(|e| MapError::io("clear lock file", &self.path, e))
    }
}

impl ExclusiveLock for FileLock {
    fn owner(&self) -> &str {
        &self.owner
    }

    fn resource(&self) -> String {
        self.path.display().to_string()
    }

    fn acquire(&self, timeout: Duration, poll_interval: Duration) -> Result<()> {
        poll_acquire(
            &self.gate,
            &self.resource(),
            &self.owner,
            timeout,
            poll_interval,
            || self.try_take(),
        )
    }

    fn release(&self) -> Result<()> {
        let released = self
            .gate
            .leave_with(|| self.clear_marker(Some(&self.owner)))?;
        if released {
            debug!(path = %self.path.display(), owner = %self.owner, "released lock");
        }
        Ok(())
    }

    fn inspect(&self) -> Result<Option<LockInfo>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(MapError::io("read lock file", &self.path, e)),
        };

        let owner = content.trim();
        if owner.is_empty() {
            return Ok(None);
        }

        let acquired_at = fs::metadata(&self.path)
            .and_then(|m| m.modified())
            .ok()
            .map(DateTime::<Utc>::from);

        Ok(Some(LockInfo {
            resource: self.resource(),
            owner: owner.to_string(),
            acquired_at,
            is_stale: acquired_at.is_some_and(|at| is_stale_since(at, self.stale_after)),
        }))
    }

    fn clear(&self) -> Result<()> {
        self.clear_marker(None)
    }

    fn destroy(&self) -> Result<()> {
        crate::fs::remove_if_exists(&self.path)?;
        Ok(())
    }
}

fn read_marker(file: &mut File, path: &Path) -> Result<String> {
    let mut content = String::new();
    file.seek(SeekFrom::Start(0))
        .and_then(|_| file.read_to_string(&mut content))
        .map_err(|e| MapError::io("read lock file", path, e))?;
    Ok(content.trim().to_string())
}

fn write_marker(file: &mut File, path: &Path, owner: &str) -> Result<()> {
    file.set_len(0)
        .and_then(|()| file.seek(SeekFrom::Start(0)))
        .and_then(|_| file.write_all(owner.as_bytes()))
        .and_then(|()| file.sync_all())
        .map_err(|e| MapError::io("write lock file", path, e))
}

fn marker_time(file: &File, path: &Path) -> Result<DateTime<Utc>> {
    file.metadata()
        .and_then(|m| m.modified())
        .map(DateTime::<Utc>::from)
        .map_err(|e| MapError::io("stat lock file", path, e))
}
