//! Queue operations.

use super::key::next_key_after;
use super::{LAST_KEY_COUNTER, Queue, TOTAL_COUNTER};
use crate::error::{MapError, Result};
use crate::map::Record;
use crate::signature;
use serde::Serialize;
use tracing::{debug, info, warn};

/// Where a [`Queue::drain`] consumer is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    /// Records handed to the callback so far, including the current one.
    pub processed: usize,
    /// Records still pending when the current one was handed over.
    pub remaining: usize,
}

impl Queue {
    /// Append a record and return its key.
    ///
    /// The key is generated while holding the lock and is later than the
    /// last key pushed by any instance, so keys follow the order in which
    /// pushes were serialized. Counters are read before the record is
    /// written; if updating them fails, the record is removed again.
    pub fn push<T: Serialize + ?Sized>(&self, value: &T, message: &str) -> Result<String> {
        let value = serde_json::to_value(value)?;
        let signature = signature::digest(&value)?;

        self.map.exclusive(|map| {
            let backend = map.backend();
            let total = backend.read_counter(TOTAL_COUNTER)? + 1;
            let floor = backend.read_counter(LAST_KEY_COUNTER)?;

            let (key, micros) = next_key_after(floor);
            backend.set_raw(&Record::new(key.clone(), value, signature, message))?;

            // The floor goes first: advancing it without a record is harmless.
            let counted = backend
                .write_counter(LAST_KEY_COUNTER, micros)
                .and_then(|()| backend.write_counter(TOTAL_COUNTER, total));
            if let Err(e) = counted {
                if let Err(undo) = backend.remove_raw(std::slice::from_ref(&key)) {
                    warn!(queue = %map.name(), key = %key, error = %undo, "failed to roll back push");
                }
                return Err(e);
            }

            debug!(queue = %map.name(), key = %key, total, "pushed record");
            Ok(key)
        })
    }

    /// Remove and return up to `n` records, oldest first.
    ///
    /// Returns fewer records (possibly none) when the queue is shorter;
    /// never waits for more.
    pub fn pop(&self, n: usize) -> Result<Vec<Record>> {
        if n == 0 {
            return Ok(Vec::new());
        }
        let records = self.map.take_first(n)?;
        debug!(queue = %self.name(), requested = n, popped = records.len(), "popped records");
        Ok(records)
    }

    /// Snapshot of pending records, oldest first, without taking the lock.
    ///
    /// Records popped between listing and reading are skipped.
    pub fn list(&self) -> Result<Vec<Record>> {
        let mut records = Vec::new();
        for key in self.map.keys()? {
            if let Some(record) = self.map.get_record(&key)? {
                records.push(record);
            }
        }
        Ok(records)
    }

    /// Number of pending records.
    pub fn count(&self) -> Result<usize> {
        self.map.size()
    }

    /// Number of pushes ever made.
    pub fn total(&self) -> Result<u64> {
        self.map.counter(TOTAL_COUNTER)
    }

    /// Drop every pending record. `total` is unchanged.
    pub fn reset(&self) -> Result<()> {
        self.map.reset()?;
        info!(queue = %self.name(), "reset queue");
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.map.validate()
    }

    /// Remove all storage; the queue is unusable afterwards.
    pub fn destroy(&self) -> Result<()> {
        self.map.destroy()
    }

    /// Pop batches of up to `batch` records until the queue is empty.
    ///
    /// `callback` sees each record with the consumer's progress. An error
    /// from the callback stops draining: the failing record and the rest of
    /// its batch are put back under their original keys, and the error is
    /// returned. Returns the number of records processed.
    pub fn drain<F>(&self, batch: usize, mut callback: F) -> Result<usize>
    where
        F: FnMut(&Record, Progress) -> Result<()>,
    {
        if batch == 0 {
            return Err(MapError::UserError("drain batch size must be at least 1".to_string()));
        }

        let mut processed = 0;
        loop {
            let records = self.pop(batch)?;
            if records.is_empty() {
                break;
            }
            let pending = self.count()?;
            let len = records.len();
            for (i, record) in records.iter().enumerate() {
                let progress = Progress {
                    processed: processed + 1,
                    remaining: pending + (len - i - 1),
                };
                if let Err(e) = callback(record, progress) {
                    self.restore(&records[i..])?;
                    return Err(e);
                }
                processed += 1;
            }
        }

        info!(queue = %self.name(), processed, "drained queue");
        Ok(processed)
    }

    fn restore(&self, records: &[Record]) -> Result<()> {
        self.map.exclusive(|map| {
            for record in records {
                map.put(record.clone())?;
            }
            Ok(())
        })?;
        debug!(queue = %self.name(), restored = records.len(), "restored unprocessed records");
        Ok(())
    }
}
