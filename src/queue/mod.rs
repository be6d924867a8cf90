//! FIFO queue over a [`Map`].
//!
//! Keys come from [`next_key`], so ascending key order is enqueue order.
//! The queue persists a `total` counter next to the records: it counts every
//! push ever made and is never decremented by `pop` or `reset`.
//!
//! The queue does not track what consumers do with popped records; a record
//! is either present (pending) or gone.

mod key;
mod operations;


pub use key::{key_time, next_key};
pub use operations::Progress;

use crate::map::Map;

/// Counter name holding the number of pushes ever made.
pub const TOTAL_COUNTER: &str = "total";

/// Counter name holding the time part of the last pushed key.
pub const LAST_KEY_COUNTER: &str = "last_key_micros";

/// A FIFO queue stored in a map.
#[derive(Debug)]
pub struct Queue {
    map: Map,
}

impl Queue {
    pub fn new(map: Map) -> Self {
        Self { map }
    }

    pub fn name(&self) -> &str {
        self.map.name()
    }

    /// The underlying map.
    pub fn map(&self) -> &Map {
        &self.map
    }

    pub fn connect(&self) -> crate::error::Result<()> {
        self.map.connect()
    }
}
