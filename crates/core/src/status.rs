//! Per-tab session state machine

use crate::channel::Subscription;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

/// Lifecycle state of the session in one tab.
///
/// `Active <-> Refreshing`, either may move to `Expired`, and `Expired` is
/// terminal until the page reloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SessionStatus {
    #[default]
    Active,
    Refreshing,
    Expired,
}

impl SessionStatus {
    #[must_use]
    pub const fn is_expired(self) -> bool {
        matches!(self, Self::Expired)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => f.write_str("active"),
            Self::Refreshing => f.write_str("refreshing"),
            Self::Expired => f.write_str("expired"),
        }
    }
}

type StatusWatcher = Rc<dyn Fn(SessionStatus)>;

/// Observable holder of the current [`SessionStatus`]
#[derive(Default)]
pub struct StatusCell {
    current: Cell<SessionStatus>,
    next_id: Cell<u64>,
    watchers: RefCell<Vec<(u64, StatusWatcher)>>,
}

impl StatusCell {
    #[must_use]
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    #[must_use]
    pub fn get(&self) -> SessionStatus {
        self.current.get()
    }

    /// Move to `next`. Leaving `Expired` is refused.
    ///
    /// Returns `true` if the status changed.
    pub fn set(&self, next: SessionStatus) -> bool {
        let current = self.current.get();
        if current == next || current.is_expired() {
            return false;
        }
        self.current.set(next);

        let watchers: Vec<StatusWatcher> = self
            .watchers
            .borrow()
            .iter()
            .map(|(_, watcher)| Rc::clone(watcher))
            .collect();
        for watcher in watchers {
            watcher(next);
        }
        true
    }

    /// Call `watcher` on every transition until the handle is dropped
    pub fn watch(self: &Rc<Self>, watcher: impl Fn(SessionStatus) + 'static) -> Subscription {
        let id = self.next_id.get() + 1;
        self.next_id.set(id);
        self.watchers.borrow_mut().push((id, Rc::new(watcher)));

        let weak: Weak<Self> = Rc::downgrade(self);
        Subscription::new(move || {
            if let Some(cell) = weak.upgrade() {
                cell.watchers.borrow_mut().retain(|(watcher_id, _)| *watcher_id != id);
            }
        })
    }
}
