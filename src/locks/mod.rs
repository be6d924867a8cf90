//! Locking subsystem for mapq.
//!
//! Every map owns one [`ExclusiveLock`]. Mutating map operations run while
//! holding it, which serializes writers across threads and processes.
//!
//! # Ownership
//!
//! A lock resource is marked with the identity string of its holder. The
//! marker is authoritative: an OS advisory lock (where one is used) only makes
//! the read-check-write of the marker atomic. Acquiring succeeds when the
//! marker is empty, already ours, or stale.
//!
//! # Re-entrancy
//!
//! The thread holding a lock may acquire it again; only the outermost release
//! clears the marker. Other threads sharing the same lock instance wait like
//! any other contender, bounded by their timeout.
//!
//! # RAII Guards
//!
//! [`LockGuard`] releases on drop. If release fails during drop, a warning is
//! logged but the program does not crash.

mod file;
mod gate;
mod guard;
mod metadata;
mod polling;
mod types;


pub use file::FileLock;
pub use gate::{Entry, ThreadGate};
pub use guard::LockGuard;
pub use metadata::owner_id;
pub use polling::{Attempt, poll_acquire};
pub use types::{LockInfo, LockSettings};

use crate::error::{MapError, Result};
use std::fmt::Debug;
use std::time::Duration;
use tracing::warn;

/// A named mutual-exclusion token, possibly shared across processes.
///
/// Maps only talk to this trait, so a backend (or a caller) can substitute
/// any acquire/release pair for the file-based default.
pub trait ExclusiveLock: Send + Sync + Debug {
    /// Identity written into the lock resource while held.
    fn owner(&self) -> &str;

    /// Human-readable name of the lock resource (a path, a key, ...).
    fn resource(&self) -> String;

    /// Block until the lock is held by this owner, or fail with `LockTimeout`.
    fn acquire(&self, timeout: Duration, poll_interval: Duration) -> Result<()>;

    /// Release one level of ownership. Never clears another owner's marker.
    fn release(&self) -> Result<()>;

    /// Current holder of the lock resource, if any.
    fn inspect(&self) -> Result<Option<LockInfo>>;

    /// Clear the marker regardless of who holds it.
    ///
    /// Operator recovery after a crashed holder; never used by map operations.
    fn clear(&self) -> Result<()>;

    /// Remove the lock resource itself.
    fn destroy(&self) -> Result<()>;
}

/// Clear a lock held by anyone (operator recovery after a crashed holder).
///
/// Refuses to clear a fresh lock unless `force` is set.
///
/// # Returns
///
/// * `Ok(LockInfo)` - Information about the cleared lock
/// * `Err(MapError::UserError)` - Lock is not held, or is fresh and `force` is unset
pub fn clear_lock(lock: &dyn ExclusiveLock, force: bool) -> Result<LockInfo> {
    let Some(info) = lock.inspect()? else {
        return Err(MapError::UserError(format!(
            "lock '{}' is not held",
            lock.resource()
        )));
    };

    if !info.is_stale && !force {
        return Err(MapError::UserError(format!(
            "lock {} is not stale; use --force to clear it anyway",
            info
        )));
    }

    lock.clear()?;
    warn!(resource = %lock.resource(), previous_owner = %info.owner, "cleared lock");
    Ok(info)
}
