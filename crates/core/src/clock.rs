//! Wall-clock sources

use std::cell::Cell;
use std::rc::Rc;

/// Source of the current wall-clock time in milliseconds since epoch
pub trait Clock {
    fn now_ms(&self) -> i64;
}

/// System time via `chrono`
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Manually advanced clock; clones share the same instant
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<i64>>,
}

impl ManualClock {
    #[must_use]
    pub fn new(now_ms: i64) -> Self {
        Self {
            now: Rc::new(Cell::new(now_ms)),
        }
    }

    pub fn set(&self, now_ms: i64) {
        self.now.set(now_ms);
    }

    pub fn advance(&self, by_ms: i64) {
        self.now.set(self.now.get() + by_ms);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now.get()
    }
}
