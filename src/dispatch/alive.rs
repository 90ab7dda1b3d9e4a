//! # In-flight handler tracker.
//!
//! Counts running invocations per handler name so a shutdown that exceeds its
//! grace period can report which handlers were stuck.
//!
//! ```text
//! handler task ──► AliveTracker::enter(name) ──► AliveGuard ──(drop)──► count -= 1
//!                                                     │
//!                                    HashMap<name, count>  ◄── snapshot()
//! ```
//!
//! Updates happen under a short synchronous lock taken on task entry and on
//! guard drop (including unwinding and cancellation).

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

/// Thread-safe tracker of running handler invocations.
#[derive(Default)]
pub struct AliveTracker {
    state: Mutex<HashMap<Arc<str>, usize>>,
}

impl AliveTracker {
    /// Creates a new empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks one invocation of `name` as running until the guard is dropped.
    pub fn enter(self: &Arc<Self>, name: Arc<str>) -> AliveGuard {
        *self.state.lock().entry(Arc::clone(&name)).or_insert(0) += 1;
        AliveGuard {
            tracker: Arc::clone(self),
            name,
        }
    }

    /// Returns sorted names of handlers with at least one running invocation.
    pub fn snapshot(&self) -> Vec<String> {
        let mut alive: Vec<String> = self
            .state
            .lock()
            .keys()
            .map(|name| name.to_string())
            .collect();
        alive.sort_unstable();
        alive
    }

    /// Returns true if `name` has a running invocation.
    pub fn is_alive(&self, name: &str) -> bool {
        self.state.lock().contains_key(name)
    }

    fn leave(&self, name: &str) {
        let mut state = self.state.lock();
        if let Some(n) = state.get_mut(name) {
            *n -= 1;
            if *n == 0 {
                state.remove(name);
            }
        }
    }
}

/// Keeps one invocation marked as running.
pub struct AliveGuard {
    tracker: Arc<AliveTracker>,
    name: Arc<str>,
}

impl Drop for AliveGuard {
    fn drop(&mut self) {
        self.tracker.leave(&self.name);
    }
}
