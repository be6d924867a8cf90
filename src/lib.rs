//! mapq: key-value maps with cross-process exclusive locking, and a FIFO
//! queue built on top of them.
//!
//! - [`map::Map`] stores JSON values with a timestamp, message and content
//!   signature, over any [`map::StorageBackend`]
//! - [`locks::ExclusiveLock`] serializes writers across threads and processes
//! - [`queue::Queue`] hands out records in push order
//!
//! The `mapq` binary drives a single configured queue from the command line.

pub mod backends;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod exit_codes;
pub mod fs;
pub mod locks;
pub mod logging;
pub mod map;
pub mod queue;
pub mod registry;
pub mod signature;

pub use error::{MapError, Result};
pub use map::{Map, Record};
pub use queue::Queue;
