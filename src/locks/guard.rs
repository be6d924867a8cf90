//! RAII lock guard implementation.

use super::ExclusiveLock;
use super::types::LockSettings;
use crate::error::Result;
use std::marker::PhantomData;
use tracing::warn;

/// RAII guard for an acquired [`ExclusiveLock`].
///
/// When dropped, one level of ownership is released. If releasing fails, a
/// warning is logged but no panic occurs. Ownership is per thread, so the
/// guard cannot be sent to another thread.
#[derive(Debug)]
pub struct LockGuard<'a> {
    lock: &'a dyn ExclusiveLock,

    /// Whether the lock has been released manually.
    released: bool,

    _not_send: PhantomData<*const ()>,
}

impl<'a> LockGuard<'a> {
    /// Acquire `lock` with the given settings.
    pub fn acquire(lock: &'a dyn ExclusiveLock, settings: &LockSettings) -> Result<Self> {
        lock.acquire(settings.timeout, settings.poll_interval)?;
        Ok(Self {
            lock,
            released: false,
            _not_send: PhantomData,
        })
    }

    /// The identity holding this guard.
    pub fn owner(&self) -> &str {
        self.lock.owner()
    }

    /// Manually release the lock, reporting errors instead of logging them.
    pub fn release(mut self) -> Result<()> {
        self.released = true;
        self.lock.release()
    }
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        if !self.released
            && let Err(e) = self.lock.release()
        {
            warn!(resource = %self.lock.resource(), error = %e, "failed to release lock");
        }
    }
}
