//! In-process thread gate for re-entrant lock ownership.

use crate::error::Result;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};
use std::time::Instant;

/// How a thread entered the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entry {
    /// First entry: the caller must now take the shared lock resource.
    Outermost,
    /// The calling thread already holds the lock.
    Nested,
}

#[derive(Debug, Default)]
struct GateState {
    holder: Option<ThreadId>,
    depth: usize,
}

/// Serializes threads that share one lock instance and tracks nesting depth.
///
/// Lock implementations call [`ThreadGate::enter`] before touching their
/// resource and [`ThreadGate::leave_with`] to release it.
#[derive(Debug, Default)]
pub struct ThreadGate {
    state: Mutex<GateState>,
    released: Condvar,
}

impl ThreadGate {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, GateState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Enter the gate, waiting for another thread to leave until `deadline`.
    ///
    /// Returns `None` if the deadline passed while another thread held the gate.
    pub fn enter(&self, deadline: Instant) -> Option<Entry> {
        let me = thread::current().id();
        let mut state = self.state();

        loop {
            match state.holder {
                Some(holder) if holder == me => {
                    state.depth += 1;
                    return Some(Entry::Nested);
                }
                None => {
                    state.holder = Some(me);
                    state.depth = 1;
                    return Some(Entry::Outermost);
                }
                Some(_) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return None;
                    }
                    state = self
                        .released
                        .wait_timeout(state, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0;
                }
            }
        }
    }

    /// Undo an outermost entry whose resource acquisition failed.
    pub fn abandon(&self) {
        let mut state = self.state();
        if state.holder == Some(thread::current().id()) {
            state.holder = None;
            state.depth = 0;
            self.released.notify_all();
        }
    }

    /// Leave one nesting level; on the outermost level run `release` first.
    ///
    /// The gate is freed even when `release` fails, and its error is returned.
    pub fn leave_with(&self, release: impl FnOnce() -> Result<()>) -> Result<bool> {
        let mut state = self.state();
        if state.holder != Some(thread::current().id()) {
            return Ok(false);
        }

        if state.depth > 1 {
            state.depth -= 1;
            return Ok(true);
        }

        let result = release();
        state.holder = None;
        state.depth = 0;
        self.released.notify_all();
        result.map(|()| true)
    }

    /// Whether the calling thread currently holds the gate.
    pub fn held_by_current_thread(&self) -> bool {
        self.state().holder == Some(thread::current().id())
    }

    /// Current nesting depth (0 when free).
    pub fn depth(&self) -> usize {
        self.state().depth
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    fn soon() -> Instant {
        Instant::now() + Duration::from_millis(200)
    }

    #[test]
    fn nested_entries_track_depth() {
        let gate = ThreadGate::new();
        assert_eq!(gate.enter(soon()), Some(Entry::Outermost));
        assert_eq!(gate.enter(soon()), Some(Entry::Nested));
        assert_eq!(gate.depth(), 2);

        let mut released = 0;
        gate.leave_with(|| {
            released += 1;
            Ok(())
        })
        .unwrap();
        assert_eq!(released, 0);
        gate.leave_with(|| {
            released += 1;
            Ok(())
        })
        .unwrap();
        assert_eq!(released, 1);
        assert_eq!(gate.depth(), 0);
    }

    #[test]
    fn other_thread_times_out_while_held() {
        let gate = Arc::new(ThreadGate::new());
        assert_eq!(gate.enter(soon()), Some(Entry::Outermost));

        let other = Arc::clone(&gate);
        let entry = std::thread::spawn(move || {
            other.enter(Instant::now() + Duration::from_millis(30))
        })
        .join()
        .unwrap();
        assert_eq!(entry, None);
    }

    #[test]
    fn other_thread_enters_after_leave() {
        let gate = Arc::new(ThreadGate::new());
        assert_eq!(gate.enter(soon()), Some(Entry::Outermost));

        let other = Arc::clone(&gate);
        let waiter = std::thread::spawn(move || {
            let entry = other.enter(Instant::now() + Duration::from_secs(5));
            other.abandon();
            entry
        });

        std::thread::sleep(Duration::from_millis(20));
        gate.leave_with(|| Ok(())).unwrap();
        assert_eq!(waiter.join().unwrap(), Some(Entry::Outermost));
    }

    #[test]
    fn leave_from_non_holder_is_a_no_op() {
        let gate = ThreadGate::new();
        assert!(!gate.leave_with(|| Ok(())).unwrap());
    }
}
