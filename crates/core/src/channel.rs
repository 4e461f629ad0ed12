//! Cross-tab publish/subscribe
//!
//! Delivery is best-effort and at-most-once per tab. Messages from one sender
//! arrive in order; a sender never receives its own messages.

use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::{Rc, Weak};
use tracing::trace;

/// Messages exchanged between tabs of the same origin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum BroadcastMessage {
    /// A user interaction happened in another tab at `ts` (ms since epoch)
    Activity { ts: i64 },
    /// Another tab stored a renewed token
    TokenRefreshed,
    /// Another tab reached the expired state; recipients must expire too
    SessionExpired,
}

/// Callback invoked for every received message
pub type MessageHandler = Rc<dyn Fn(&BroadcastMessage)>;

/// Publish/subscribe capability shared by all tabs of an origin
pub trait CrossTabChannel {
    /// Send `message` to every other tab
    fn publish(&self, message: &BroadcastMessage);

    /// Register `handler`; dropping the returned handle unsubscribes
    fn subscribe(&self, handler: MessageHandler) -> Subscription;
}

/// Handle that runs its teardown exactly once, on drop
#[must_use = "dropping a Subscription immediately unsubscribes"]
pub struct Subscription {
    teardown: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    /// Create a handle that runs `teardown` when dropped
    pub fn new(teardown: impl FnOnce() + 'static) -> Self {
        Self {
            teardown: Some(Box::new(teardown)),
        }
    }

    /// A handle with nothing to tear down
    pub fn inert() -> Self {
        Self { teardown: None }
    }

    /// Unsubscribe now
    pub fn cancel(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(teardown) = self.teardown.take() {
            teardown();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.teardown.is_some())
            .finish()
    }
}

/// Channel used when no cross-tab transport exists: each tab acts alone
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopChannel;

impl CrossTabChannel for NoopChannel {
    fn publish(&self, _message: &BroadcastMessage) {}

    fn subscribe(&self, _handler: MessageHandler) -> Subscription {
        Subscription::inert()
    }
}

#[derive(Default)]
struct BusState {
    next_id: u64,
    handlers: Vec<(u64, u64, MessageHandler)>,
    queue: VecDeque<(u64, BroadcastMessage)>,
}

impl BusState {
    fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

/// In-memory bus connecting several simulated tabs.
///
/// Published messages are queued and handed out by [`LocalBus::flush`], the
/// way an event loop delivers them on a later turn.
#[derive(Clone, Default)]
pub struct LocalBus {
    state: Rc<RefCell<BusState>>,
}

impl LocalBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a channel endpoint for one tab
    #[must_use]
    pub fn endpoint(&self) -> LocalChannel {
        let id = self.state.borrow_mut().allocate_id();
        LocalChannel {
            id,
            state: Rc::clone(&self.state),
        }
    }

    /// Messages waiting for delivery
    #[must_use]
    pub fn pending(&self) -> usize {
        self.state.borrow().queue.len()
    }

    /// Deliver queued messages, including ones published while delivering.
    ///
    /// Returns the number of handler invocations.
    pub fn flush(&self) -> usize {
        let mut delivered = 0;
        loop {
            let Some((sender, message)) = self.state.borrow_mut().queue.pop_front() else {
                return delivered;
            };
            let recipients: Vec<MessageHandler> = self
                .state
                .borrow()
                .handlers
                .iter()
                .filter(|(_, endpoint, _)| *endpoint != sender)
                .map(|(_, _, handler)| Rc::clone(handler))
                .collect();
            trace!(?message, recipients = recipients.len(), "Delivering message");
            for handler in recipients {
                handler(&message);
                delivered += 1;
            }
        }
    }
}

/// One tab's view of a [`LocalBus`]
pub struct LocalChannel {
    id: u64,
    state: Rc<RefCell<BusState>>,
}

impl CrossTabChannel for LocalChannel {
    fn publish(&self, message: &BroadcastMessage) {
        self.state.borrow_mut().queue.push_back((self.id, *message));
    }

    fn subscribe(&self, handler: MessageHandler) -> Subscription {
        let mut state = self.state.borrow_mut();
        let subscription_id = state.allocate_id();
        state.handlers.push((subscription_id, self.id, handler));

        let weak: Weak<RefCell<BusState>> = Rc::downgrade(&self.state);
        Subscription::new(move || {
            if let Some(state) = weak.upgrade() {
                state
                    .borrow_mut()
                    .handlers
                    .retain(|(id, _, _)| *id != subscription_id);
            }
        })
    }
}
