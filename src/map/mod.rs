//! The abstract map.
//!
//! A [`Map`] pairs a [`StorageBackend`] (how records persist) with an
//! [`ExclusiveLock`](crate::locks::ExclusiveLock) (who may mutate). The map
//! adds everything that must behave identically across backends: key rules,
//! signatures, lock wrapping, batch helpers and the destroyed state.
//!
//! # Example
//!
//! ```no_run
//! use mapq::backends::FileBackend;
//! use mapq::map::Map;
//!
//! let map = Map::new("results", Box::new(FileBackend::new("/tmp/results")));
//! let sig = map.set("run-1", &vec![1, 2, 3])?;
//! assert_eq!(map.has_with_signature(&["run-1"], &vec![1, 2, 3])?, vec![true]);
//! assert_eq!(map.get::<Vec<u32>>("run-1")?, Some(vec![1, 2, 3]));
//! # let _ = sig;
//! # Ok::<(), mapq::error::MapError>(())
//! ```

mod backend;
mod model;
mod operations;
mod record;

#[cfg(test)]
mod tests;

pub use backend::{BackendKind, StorageBackend};
pub use model::{Map, MapBuilder};
pub use record::{Record, RecordHeader, validate_key};
