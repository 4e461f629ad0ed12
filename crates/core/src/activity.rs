//! Most recent user interaction seen by this tab or any sibling tab

use std::cell::Cell;

/// Monotonic activity timestamp (milliseconds since epoch)
#[derive(Debug)]
pub struct ActivityTracker {
    last: Cell<i64>,
}

impl ActivityTracker {
    /// Seed the tracker with the mount time
    #[must_use]
    pub const fn new(now_ms: i64) -> Self {
        Self {
            last: Cell::new(now_ms),
        }
    }

    /// Record a local interaction; returns the resulting timestamp
    pub fn touch(&self, now_ms: i64) -> i64 {
        self.raise(now_ms);
        self.last.get()
    }

    /// Merge an interaction reported by another tab.
    ///
    /// Returns `true` if the timestamp moved forward.
    pub fn observe_remote(&self, ts_ms: i64) -> bool {
        self.raise(ts_ms)
    }

    fn raise(&self, candidate: i64) -> bool {
        if candidate > self.last.get() {
            self.last.set(candidate);
            true
        } else {
            false
        }
    }

    /// Most recent known interaction
    #[must_use]
    pub fn last(&self) -> i64 {
        self.last.get()
    }

    /// Milliseconds since the most recent known interaction
    #[must_use]
    pub fn idle_for(&self, now_ms: i64) -> i64 {
        now_ms - self.last.get()
    }
}
