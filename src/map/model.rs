//! The `Map` struct, its builder and lifecycle state.

use super::backend::StorageBackend;
use crate::error::{MapError, Result};
use crate::locks::{ExclusiveLock, LockGuard, LockSettings, owner_id};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum MapState {
    Fresh,
    Connected,
    Destroyed,
}

/// A key-value map whose mutations are serialized by an exclusive lock.
///
/// Reads never take the lock; they may observe a concurrent writer's state
/// but never a half-written record.
#[derive(Debug)]
pub struct Map {
    pub(super) name: String,
    pub(super) backend: Box<dyn StorageBackend>,
    pub(super) lock: Box<dyn ExclusiveLock>,
    pub(super) settings: LockSettings,
    state: Mutex<MapState>,
}

/// Builder for [`Map`].
#[derive(Debug)]
pub struct MapBuilder {
    name: String,
    backend: Box<dyn StorageBackend>,
    owner: Option<String>,
    lock: Option<Box<dyn ExclusiveLock>>,
    settings: LockSettings,
}

impl MapBuilder {
    /// Lock identity; a fresh [`owner_id`] is generated when unset.
    pub fn owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    /// Use a custom lock instead of the backend's default.
    pub fn lock(mut self, lock: Box<dyn ExclusiveLock>) -> Self {
        self.lock = Some(lock);
        self
    }

    pub fn settings(mut self, settings: LockSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn build(self) -> Map {
        let lock = match self.lock {
            Some(lock) => lock,
            None => {
                let owner = self.owner.unwrap_or_else(owner_id);
                self.backend.default_lock(&owner, &self.settings)
            }
        };

        Map {
            name: self.name,
            backend: self.backend,
            lock,
            settings: self.settings,
            state: Mutex::new(MapState::Fresh),
        }
    }
}

impl Map {
    /// Create a map with a generated owner identity and default lock settings.
    pub fn new(name: impl Into<String>, backend: Box<dyn StorageBackend>) -> Self {
        Self::builder(name, backend).build()
    }

    pub fn builder(name: impl Into<String>, backend: Box<dyn StorageBackend>) -> MapBuilder {
        MapBuilder {
            name: name.into(),
            backend,
            owner: None,
            lock: None,
            settings: LockSettings::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The lock identity of this map instance.
    pub fn owner(&self) -> &str {
        self.lock.owner()
    }

    pub fn backend(&self) -> &dyn StorageBackend {
        self.backend.as_ref()
    }

    pub fn lock(&self) -> &dyn ExclusiveLock {
        self.lock.as_ref()
    }

    pub fn settings(&self) -> &LockSettings {
        &self.settings
    }

    fn state(&self) -> MutexGuard<'_, MapState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether `destroy` has been observed on this instance.
    pub fn is_destroyed(&self) -> bool {
        *self.state() == MapState::Destroyed
    }

    /// Run backend setup if it has not run yet. Fails on a destroyed map.
    pub fn connect(&self) -> Result<()> {
        let mut state = self.state();
        match *state {
            MapState::Destroyed => Err(MapError::destroyed(&self.name)),
            MapState::Connected => Ok(()),
            MapState::Fresh => {
                if let Err(e) = self.backend.connect() {
                    if e.is_destroyed() {
                        *state = MapState::Destroyed;
                        return Err(MapError::destroyed(&self.name));
                    }
                    return Err(e);
                }
                info!(
                    map = %self.name,
                    backend = %self.backend.kind(),
                    location = %self.backend.location(),
                    "connected map"
                );
                *state = MapState::Connected;
                Ok(())
            }
        }
    }

    pub(super) fn mark_destroyed(&self) -> MapError {
        *self.state() = MapState::Destroyed;
        MapError::destroyed(&self.name)
    }

    /// Whether storage this instance connected to has since been removed.
    fn storage_vanished(&self) -> bool {
        matches!(self.backend.exists(), Ok(false))
    }

    /// Confirm an empty read result is real and not a destroyed store.
    ///
    /// Reads take no lock, so another instance may have destroyed the
    /// storage since this one connected.
    pub(super) fn confirm_empty(&self) -> Result<()> {
        if self.storage_vanished() {
            warn!(map = %self.name, "storage removed by another instance");
            return Err(self.mark_destroyed());
        }
        Ok(())
    }

    /// Run `f` while holding the map's exclusive lock.
    ///
    /// Map operations called from `f` on the same thread re-enter the lock
    /// instead of deadlocking, so several mutations can be grouped under one
    /// acquisition. Fails with `InvalidMap` if the storage was destroyed,
    /// here or by another instance.
    pub fn exclusive<T>(&self, f: impl FnOnce(&Map) -> Result<T>) -> Result<T> {
        self.connect()?;

        let guard = match LockGuard::acquire(self.lock.as_ref(), &self.settings) {
            Ok(guard) => guard,
            Err(e) => {
                if self.storage_vanished() {
                    return Err(self.mark_destroyed());
                }
                return Err(e);
            }
        };

        if self.storage_vanished() {
            drop(guard);
            warn!(map = %self.name, "storage removed by another instance");
            return Err(self.mark_destroyed());
        }

        let result = f(self);
        let released = guard.release();
        let value = result?;
        released?;
        Ok(value)
    }
}
