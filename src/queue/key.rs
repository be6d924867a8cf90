//! Ordered queue keys.
//!
//! A key is `<micros>-<suffix>`: the enqueue time in microseconds since the
//! Unix epoch, zero-padded to 20 digits so string order equals time order,
//! then 8 random hex characters. Within one process the time part never
//! repeats or goes backwards. A queue also passes the time part of the last
//! key it stored, so keys keep ascending across processes and clock steps.
//! The suffix breaks any remaining ties.

use chrono::{DateTime, Utc};
use regex::Regex;
use std::sync::LazyLock;
use std::sync::atomic::{AtomicU64, Ordering};

static LAST_MICROS: AtomicU64 = AtomicU64::new(0);

static KEY_SHAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{20})-([0-9a-f]{8})$").expect("valid regex"));

/// Generate the next queue key.
pub fn next_key() -> String {
    next_key_after(0).0
}

/// Generate a key whose time part is greater than `floor`.
///
/// Returns the key and its time part.
pub(crate) fn next_key_after(floor: u64) -> (String, u64) {
    let now = u64::try_from(Utc::now().timestamp_micros()).unwrap_or(0);
    let micros = reserve_micros(now.max(floor.saturating_add(1)));
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    (format!("{:020}-{}", micros, &suffix[..8]), micros)
}

/// Claim a timestamp strictly greater than any claimed before in this process.
fn reserve_micros(now: u64) -> u64 {
    let previous = LAST_MICROS
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
            Some(now.max(last + 1))
        })
        .unwrap_or_else(|last| last);
    now.max(previous + 1)
}

/// Enqueue time encoded in a key produced by [`next_key`].
pub fn key_time(key: &str) -> Option<DateTime<Utc>> {
    let captures = KEY_SHAPE.captures(key)?;
    let micros: i64 = captures[1].parse().ok()?;
    DateTime::from_timestamp_micros(micros)
}
