//! In-memory backend.
//!
//! Records live in a [`MemoryHandle`]. Maps built on clones of the same
//! handle share records, counters and the lock slot, so they coordinate like
//! separate processes would, but only within this process.

use crate::error::{MapError, Result};
use crate::locks::{
    Attempt, ExclusiveLock, LockInfo, LockSettings, ThreadGate, poll_acquire,
};
use crate::map::{BackendKind, Record, RecordHeader, StorageBackend};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

#[derive(Debug)]
struct MemoryStore {
    records: Mutex<BTreeMap<String, Record>>,
    counters: Mutex<HashMap<String, u64>>,
    lock_slot: Mutex<Option<(String, DateTime<Utc>)>>,
    alive: AtomicBool,
}

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Shared in-process storage. Cloning shares the same store.
#[derive(Debug, Clone)]
pub struct MemoryHandle {
    store: Arc<MemoryStore>,
}

impl Default for MemoryHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryHandle {
    pub fn new() -> Self {
        Self {
            store: Arc::new(MemoryStore {
                records: Mutex::new(BTreeMap::new()),
                counters: Mutex::new(HashMap::new()),
                lock_slot: Mutex::new(None),
                alive: AtomicBool::new(true),
            }),
        }
    }

    /// Whether two handles share a store.
    pub fn same_store(&self, other: &MemoryHandle) -> bool {
        Arc::ptr_eq(&self.store, &other.store)
    }
}

/// Backend storing records in a [`MemoryHandle`].
#[derive(Debug, Clone)]
pub struct MemoryBackend {
    handle: MemoryHandle,
}

impl MemoryBackend {
    /// A backend over a new, private store.
    pub fn new() -> Self {
        Self::with_handle(MemoryHandle::new())
    }

    /// A backend over an existing (possibly shared) store.
    pub fn with_handle(handle: MemoryHandle) -> Self {
        Self { handle }
    }

    pub fn handle(&self) -> &MemoryHandle {
        &self.handle
    }

    fn store(&self) -> &MemoryStore {
        &self.handle.store
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageBackend for MemoryBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Memory
    }

    fn location(&self) -> String {
        format!("memory:{:p}", Arc::as_ptr(&self.handle.store))
    }

    fn connect(&self) -> Result<()> {
        if self.store().alive.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(MapError::destroyed(&self.location()))
        }
    }

    fn exists(&self) -> Result<bool> {
        Ok(self.store().alive.load(Ordering::SeqCst))
    }

    fn get_raw(&self, key: &str) -> Result<Option<Record>> {
        Ok(locked(&self.store().records).get(key).cloned())
    }

    fn set_raw(&self, record: &Record) -> Result<()> {
        locked(&self.store().records).insert(record.key.clone(), record.clone());
        Ok(())
    }

    fn remove_raw(&self, keys: &[String]) -> Result<()> {
        let mut records = locked(&self.store().records);
        for key in keys {
            records.remove(key);
        }
        Ok(())
    }

    fn list_keys_raw(&self) -> Result<Vec<RecordHeader>> {
        Ok(locked(&self.store().records)
            .values()
            .map(Record::header)
            .collect())
    }

    fn validate_raw(&self) -> Result<Vec<String>> {
        Ok(locked(&self.store().records)
            .iter()
            .filter(|(key, record)| *key != &record.key)
            .map(|(key, record)| format!("entry '{}' holds record '{}'", key, record.key))
            .collect())
    }

    fn destroy_raw(&self) -> Result<()> {
        self.store().alive.store(false, Ordering::SeqCst);
        locked(&self.store().records).clear();
        locked(&self.store().counters).clear();
        Ok(())
    }

    fn read_counter(&self, name: &str) -> Result<u64> {
        Ok(locked(&self.store().counters)
            .get(name)
            .copied()
            .unwrap_or(0))
    }

    fn write_counter(&self, name: &str, value: u64) -> Result<()> {
        locked(&self.store().counters).insert(name.to_string(), value);
        Ok(())
    }

    fn default_lock(&self, owner: &str, _settings: &LockSettings) -> Box<dyn ExclusiveLock> {
        Box::new(MemoryLock::new(self.handle.clone(), owner))
    }
}

/// Lock whose marker lives in a [`MemoryHandle`].
#[derive(Debug)]
pub struct MemoryLock {
    handle: MemoryHandle,
    owner: String,
    gate: ThreadGate,
}

impl MemoryLock {
    pub fn new(handle: MemoryHandle, owner: impl Into<String>) -> Self {
        Self {
            handle,
            owner: owner.into(),
            gate: ThreadGate::new(),
        }
    }

    fn slot(&self) -> MutexGuard<'_, Option<(String, DateTime<Utc>)>> {
        locked(&self.handle.store.lock_slot)
    }

    fn try_take(&self) -> Attempt {
        let mut slot = self.slot();
        match slot.as_ref() {
            Some((holder, _)) if *holder != self.owner => Attempt::Busy(Some(holder.clone())),
            _ => {
                *slot = Some((self.owner.clone(), Utc::now()));
                Attempt::Taken
            }
        }
    }
}

impl ExclusiveLock for MemoryLock {
    fn owner(&self) -> &str {
        &self.owner
    }

    fn resource(&self) -> String {
        format!("memory-lock:{:p}", Arc::as_ptr(&self.handle.store))
    }

    fn acquire(&self, timeout: Duration, poll_interval: Duration) -> Result<()> {
        poll_acquire(
            &self.gate,
            &self.resource(),
            &self.owner,
            timeout,
            poll_interval,
            || Ok(self.try_take()),
        )
    }

    fn release(&self) -> Result<()> {
        self.gate.leave_with(|| {
            let mut slot = self.slot();
            if slot.as_ref().is_some_and(|(holder, _)| *holder == self.owner) {
                *slot = None;
            }
            Ok(())
        })?;
        Ok(())
    }

    fn inspect(&self) -> Result<Option<LockInfo>> {
        Ok(self.slot().as_ref().map(|(owner, since)| LockInfo {
            resource: self.resource(),
            owner: owner.clone(),
            acquired_at: Some(*since),
            is_stale: false,
        }))
    }

    fn clear(&self) -> Result<()> {
        *self.slot() = None;
        Ok(())
    }

    fn destroy(&self) -> Result<()> {
        self.clear()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::Map;

    #[test]
    fn clones_share_the_store() {
        let handle = MemoryHandle::new();
        let a = Map::new("shared", Box::new(MemoryBackend::with_handle(handle.clone())));
        let b = Map::new("shared", Box::new(MemoryBackend::with_handle(handle.clone())));

        a.set("k", &1).unwrap();
        assert_eq!(b.get::<i32>("k").unwrap(), Some(1));
        assert!(handle.same_store(MemoryBackend::with_handle(handle.clone()).handle()));
    }

    #[test]
    fn private_stores_are_separate() {
        let a = Map::new("a", Box::new(MemoryBackend::new()));
        let b = Map::new("b", Box::new(MemoryBackend::new()));

        a.set("k", &1).unwrap();
        assert_eq!(b.get::<i32>("k").unwrap(), None);
    }

    #[test]
    fn memory_lock_contends_between_owners() {
        let handle = MemoryHandle::new();
        let alice = MemoryLock::new(handle.clone(), "alice");
        let bob = MemoryLock::new(handle, "bob");

        alice.acquire(Duration::ZERO, Duration::from_millis(1)).unwrap();
        assert!(matches!(
            bob.acquire(Duration::from_millis(10), Duration::from_millis(1)),
            Err(MapError::LockTimeout { .. })
        ));
        assert_eq!(alice.inspect().unwrap().unwrap().owner, "alice");

        alice.release().unwrap();
        bob.acquire(Duration::ZERO, Duration::from_millis(1)).unwrap();
        bob.release().unwrap();
        assert!(bob.inspect().unwrap().is_none());
    }

    #[test]
    fn destroyed_handle_cannot_be_reconnected() {
        let handle = MemoryHandle::new();
        let first = Map::new("m", Box::new(MemoryBackend::with_handle(handle.clone())));
        first.set("k", &1).unwrap();
        first.destroy().unwrap();

        let second = Map::new("jobs", Box::new(MemoryBackend::with_handle(handle)));
        let err = second.get::<i32>("k").unwrap_err();
        assert!(err.is_destroyed());
        assert_eq!(err.to_string(), "map 'jobs' is invalid: map has been destroyed");
        assert!(second.is_destroyed());
    }
}
