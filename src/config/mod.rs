//! Store configuration for mapq.
//!
//! This module defines the [`StoreConfig`] struct that represents `mapq.yaml`.
//! It supports forward-compatible YAML parsing (unknown fields are ignored),
//! sensible defaults for optional fields, validation of config values, and
//! opening the configured backend, map or queue.

mod model;
mod operations;
pub mod types;

#[cfg(test)]
mod tests;

// Re-export public API
pub use model::StoreConfig;
pub use types::DEFAULT_CONFIG_FILE;
