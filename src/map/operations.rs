//! Public map operations.
//!
//! `set`, `remove`, `reset`, `validate` and `destroy` run under the map lock.
//! `get`, `has`, `keys` and `size` read without it.

use super::model::Map;
use super::record::{Record, RecordHeader, validate_key};
use crate::error::{MapError, Result};
use crate::locks::LockInfo;
use crate::signature;
use globset::Glob;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use tracing::{debug, info};

impl Map {
    /// Store `value` under `key`, signed with the digest of `value`.
    ///
    /// Returns the signature.
    pub fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<String> {
        let value = serde_json::to_value(value)?;
        let signature = signature::digest(&value)?;
        self.put(Record::new(key, value, signature, ""))
    }

    /// Store `value` under `key`, signed with the digest of `signature` instead.
    pub fn set_with_signature<T, S>(&self, key: &str, value: &T, signature: &S) -> Result<String>
    where
        T: Serialize + ?Sized,
        S: Serialize + ?Sized,
    {
        let value = serde_json::to_value(value)?;
        let signature = signature::digest(signature)?;
        self.put(Record::new(key, value, signature, ""))
    }

    /// Store a fully built record under the lock.
    pub fn put(&self, record: Record) -> Result<String> {
        validate_key(&record.key)?;
        self.exclusive(|map| {
            map.backend.set_raw(&record)?;
            debug!(map = %map.name, key = %record.key, "set record");
            Ok(record.signature)
        })
    }

    /// Read and decode the value under `key`.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        self.get_record(key)?
            .map(|record| record.value_as())
            .transpose()
    }

    /// Read and decode the value under `key`, or return `default`.
    pub fn get_or<T: DeserializeOwned>(&self, key: &str, default: T) -> Result<T> {
        Ok(self.get(key)?.unwrap_or(default))
    }

    /// Read the whole record under `key`.
    pub fn get_record(&self, key: &str) -> Result<Option<Record>> {
        validate_key(key)?;
        self.connect()?;
        let record = self.backend.get_raw(key)?;
        if record.is_none() {
            self.confirm_empty()?;
        }
        Ok(record)
    }

    /// Existence check per key, ignoring signatures.
    pub fn has<K: AsRef<str>>(&self, keys: &[K]) -> Result<Vec<bool>> {
        self.has_matching(keys, None)
    }

    /// Existence check per key; the stored signature must equal `digest(signature)`.
    pub fn has_with_signature<K, S>(&self, keys: &[K], signature: &S) -> Result<Vec<bool>>
    where
        K: AsRef<str>,
        S: Serialize + ?Sized,
    {
        let expected = signature::digest(signature)?;
        self.has_matching(keys, Some(expected))
    }

    /// Existence check per key against an already-computed signature.
    pub fn has_with_encoded_signature<K: AsRef<str>>(
        &self,
        keys: &[K],
        signature: &str,
    ) -> Result<Vec<bool>> {
        self.has_matching(keys, Some(signature.to_string()))
    }

    fn has_matching<K: AsRef<str>>(&self, keys: &[K], expected: Option<String>) -> Result<Vec<bool>> {
        self.connect()?;
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let stored: HashMap<String, String> = self
            .backend
            .list_keys_raw()?
            .into_iter()
            .map(|h| (h.key, h.signature))
            .collect();
        if stored.is_empty() {
            self.confirm_empty()?;
            return Ok(vec![false; keys.len()]);
        }

        Ok(keys
            .iter()
            .map(|key| match (stored.get(key.as_ref()), &expected) {
                (None, _) => false,
                (Some(_), None) => true,
                (Some(actual), Some(expected)) => actual == expected,
            })
            .collect())
    }

    /// Remove keys under the lock; missing keys are ignored.
    pub fn remove<K: AsRef<str>>(&self, keys: &[K]) -> Result<()> {
        let keys: Vec<String> = keys.iter().map(|k| k.as_ref().to_string()).collect();
        for key in &keys {
            validate_key(key)?;
        }
        self.exclusive(|map| {
            map.backend.remove_raw(&keys)?;
            debug!(map = %map.name, count = keys.len(), "removed records");
            Ok(())
        })
    }

    /// Remove every record under the lock. Counters are kept.
    pub fn reset(&self) -> Result<()> {
        self.exclusive(|map| {
            let keys: Vec<String> = map
                .backend
                .list_keys_raw()?
                .into_iter()
                .map(|h| h.key)
                .collect();
            map.backend.remove_raw(&keys)?;
            info!(map = %map.name, removed = keys.len(), "reset map");
            Ok(())
        })
    }

    /// Set several values; each write is locked separately.
    pub fn mset<K, T, I>(&self, items: I) -> Result<Vec<String>>
    where
        K: AsRef<str>,
        T: Serialize,
        I: IntoIterator<Item = (K, T)>,
    {
        items
            .into_iter()
            .map(|(key, value)| self.set(key.as_ref(), &value))
            .collect()
    }

    /// Get several values; absent keys yield `None`.
    pub fn mget<K: AsRef<str>, T: DeserializeOwned>(&self, keys: &[K]) -> Result<Vec<Option<T>>> {
        keys.iter().map(|key| self.get(key.as_ref())).collect()
    }

    /// All record headers, sorted by key.
    pub fn headers(&self) -> Result<Vec<RecordHeader>> {
        self.connect()?;
        let mut headers = self.backend.list_keys_raw()?;
        if headers.is_empty() {
            self.confirm_empty()?;
        }
        headers.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(headers)
    }

    /// All keys in ascending order.
    pub fn keys(&self) -> Result<Vec<String>> {
        Ok(self.headers()?.into_iter().map(|h| h.key).collect())
    }

    /// All `(key, signature)` pairs in ascending key order.
    pub fn keys_with_signatures(&self) -> Result<Vec<(String, String)>> {
        Ok(self
            .headers()?
            .into_iter()
            .map(|h| (h.key, h.signature))
            .collect())
    }

    /// Keys matching a glob pattern such as `job-*`.
    pub fn keys_matching(&self, pattern: &str) -> Result<Vec<String>> {
        let matcher = Glob::new(pattern)
            .map_err(|e| MapError::UserError(format!("invalid key pattern '{}': {}", pattern, e)))?
            .compile_matcher();
        Ok(self
            .keys()?
            .into_iter()
            .filter(|key| matcher.is_match(key))
            .collect())
    }

    /// Number of records.
    pub fn size(&self) -> Result<usize> {
        self.connect()?;
        let size = self.backend.list_keys_raw()?.len();
        if size == 0 {
            self.confirm_empty()?;
        }
        Ok(size)
    }

    /// Check storage integrity under the lock.
    pub fn validate(&self) -> Result<()> {
        self.exclusive(|map| {
            let problems = map.backend.validate_raw()?;
            if problems.is_empty() {
                debug!(map = %map.name, "validated map");
                Ok(())
            } else {
                Err(MapError::corrupted(&map.name, problems.join("; ")))
            }
        })
    }

    /// Remove all storage and the lock resource. The map is unusable afterwards.
    pub fn destroy(&self) -> Result<()> {
        self.exclusive(|map| {
            map.backend.destroy_raw()?;
            map.lock.destroy()
        })?;
        self.mark_destroyed();
        info!(map = %self.name, location = %self.backend.location(), "destroyed map");
        Ok(())
    }

    /// Read a named counter without the lock.
    pub fn counter(&self, name: &str) -> Result<u64> {
        self.connect()?;
        let value = self.backend.read_counter(name)?;
        if value == 0 {
            self.confirm_empty()?;
        }
        Ok(value)
    }

    /// Add `by` to a named counter under the lock and return the new value.
    pub fn increment_counter(&self, name: &str, by: u64) -> Result<u64> {
        self.exclusive(|map| {
            let value = map.backend.read_counter(name)? + by;
            map.backend.write_counter(name, value)?;
            Ok(value)
        })
    }

    /// Who holds the lock right now, if anyone.
    pub fn lock_info(&self) -> Result<Option<LockInfo>> {
        if self.is_destroyed() {
            return Err(MapError::destroyed(&self.name));
        }
        self.lock.inspect()
    }

    /// Pop helper used by queues: remove and return the first `n` records in key order.
    pub(crate) fn take_first(&self, n: usize) -> Result<Vec<Record>> {
        self.exclusive(|map| {
            let keys: Vec<String> = map
                .headers()?
                .into_iter()
                .take(n)
                .map(|h| h.key)
                .collect();

            let mut records = Vec::with_capacity(keys.len());
            for key in &keys {
                if let Some(record) = map.backend.get_raw(key)? {
                    records.push(record);
                }
            }
            map.backend.remove_raw(&keys)?;
            Ok(records)
        })
    }
}
