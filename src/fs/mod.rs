//! Filesystem utilities for mapq.
//!
//! Every record, table and counter file is written through [`atomic_write`],
//! so concurrent readers only ever see complete files.

pub mod atomic;

pub use atomic::{atomic_write, is_reserved_name, read_optional, remove_if_exists};
