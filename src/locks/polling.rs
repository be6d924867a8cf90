//! The poll-sleep-retry acquisition loop shared by all lock implementations.

use super::gate::{Entry, ThreadGate};
use crate::error::{MapError, Result};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Outcome of one attempt to mark a lock resource as ours.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attempt {
    /// The marker now holds our identity.
    Taken,
    /// Someone else holds it (identity if known).
    Busy(Option<String>),
}

/// Acquire a lock resource by polling `attempt` until it succeeds or `timeout` elapses.
///
/// The thread gate is entered first, so nested acquisitions from the holding
/// thread return immediately without touching the resource. A zero timeout
/// makes exactly one attempt.
pub fn poll_acquire(
    gate: &ThreadGate,
    resource: &str,
    owner: &str,
    timeout: Duration,
    poll_interval: Duration,
    mut attempt: impl FnMut() -> Result<Attempt>,
) -> Result<()> {
    let started = Instant::now();
    let deadline = started + timeout;

    match gate.enter(deadline) {
        Some(Entry::Nested) => {
            trace!(resource, owner, "re-entered lock");
            return Ok(());
        }
        Some(Entry::Outermost) => {}
        None => {
            return Err(timed_out(
                resource,
                owner,
                started,
                Some(format!("{} (another thread)", owner)),
            ));
        }
    }

    let mut holder = None;
    loop {
        match attempt() {
            Ok(Attempt::Taken) => {
                debug!(
                    resource,
                    owner,
                    waited_ms = started.elapsed().as_millis() as u64,
                    "acquired lock"
                );
                return Ok(());
            }
            Ok(Attempt::Busy(current)) => {
                if current.is_some() {
                    holder = current;
                }
            }
            Err(e) => {
                gate.abandon();
                return Err(e);
            }
        }

        let now = Instant::now();
        if now >= deadline {
            gate.abandon();
            return Err(timed_out(resource, owner, started, holder));
        }
        thread::sleep(poll_interval.min(deadline - now));
    }
}

fn timed_out(resource: &str, owner: &str, started: Instant, holder: Option<String>) -> MapError {
    MapError::LockTimeout {
        resource: resource.to_string(),
        owner: owner.to_string(),
        waited_ms: started.elapsed().as_millis() as u64,
        holder,
    }
}
