//! Lock settings and information structures.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::time::Duration;

/// Timing parameters for acquiring a map's lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockSettings {
    /// Total time budget for one acquisition.
    pub timeout: Duration,

    /// Sleep between acquisition attempts.
    pub poll_interval: Duration,

    /// Age after which a marker is considered abandoned by a crashed holder.
    pub stale_after: Option<Duration>,
}

impl Default for LockSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            poll_interval: Duration::from_millis(50),
            stale_after: Some(Duration::from_secs(120 * 60)),
        }
    }
}

/// Information about a held lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockInfo {
    /// The lock resource (file path, key, ...).
    pub resource: String,

    /// Identity of the holder.
    pub owner: String,

    /// When the marker was last written, if the backend knows.
    pub acquired_at: Option<DateTime<Utc>>,

    /// Whether the marker is older than the stale threshold.
    pub is_stale: bool,
}

impl LockInfo {
    /// Age of the marker, if its write time is known.
    pub fn age(&self) -> Option<ChronoDuration> {
        self.acquired_at
            .map(|at| Utc::now().signed_duration_since(at))
    }

    /// Format the age as a human-readable string.
    pub fn age_string(&self) -> String {
        let Some(age) = self.age() else {
            return "unknown".to_string();
        };
        let minutes = age.num_minutes();
        let hours = age.num_hours();
        let days = age.num_days();

        if days > 0 {
            format!("{}d {}h", days, hours % 24)
        } else if hours > 0 {
            format!("{}h {}m", hours, minutes % 60)
        } else {
            format!("{}m", minutes)
        }
    }
}

impl std::fmt::Display for LockInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} (owner: {}, age: {}{})",
            self.resource,
            self.owner,
            self.age_string(),
            if self.is_stale { ", STALE" } else { "" }
        )
    }
}

/// Whether a marker written at `at` is older than `stale_after`.
pub(crate) fn is_stale_since(at: DateTime<Utc>, stale_after: Option<Duration>) -> bool {
    match stale_after {
        Some(limit) => Utc::now()
            .signed_duration_since(at)
            .to_std()
            .is_ok_and(|age| age > limit),
        None => false,
    }
}
