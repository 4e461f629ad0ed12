//! The single exit path of a session

use crate::channel::{BroadcastMessage, CrossTabChannel};
use crate::error::SessionFailure;
use crate::status::{SessionStatus, StatusCell};
use crate::store::TokenStore;
use std::cell::Cell;
use std::fmt;
use std::rc::Rc;
use tracing::{debug, info, warn};

/// Moves the tab to another page
pub trait Navigator {
    fn navigate(&self, destination: &str);
}

/// Why the session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryReason {
    /// A terminal failure detected by this tab
    Failure(SessionFailure),
    /// Another tab announced expiry
    RemoteExpired,
    /// The user logged out
    Logout,
}

impl fmt::Display for ExpiryReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failure(failure) => write!(f, "{failure}"),
            Self::RemoteExpired => f.write_str("expired in another tab"),
            Self::Logout => f.write_str("logout"),
        }
    }
}

/// One-shot latch guarding the redirect
#[derive(Debug, Default)]
pub struct RedirectGuard {
    fired: Cell<bool>,
}

impl RedirectGuard {
    /// Flip the latch; `true` only for the first caller
    pub fn fire(&self) -> bool {
        !self.fired.replace(true)
    }

    #[must_use]
    pub fn has_fired(&self) -> bool {
        self.fired.get()
    }
}

/// Clears credentials, informs sibling tabs, and leaves for the login page.
///
/// Idempotent per tab: only the first trigger has any effect.
pub struct ExpiryHandler {
    guard: RedirectGuard,
    store: Rc<TokenStore>,
    channel: Rc<dyn CrossTabChannel>,
    navigator: Rc<dyn Navigator>,
    status: Rc<StatusCell>,
    destination: String,
}

impl ExpiryHandler {
    pub fn new(
        store: Rc<TokenStore>,
        channel: Rc<dyn CrossTabChannel>,
        navigator: Rc<dyn Navigator>,
        status: Rc<StatusCell>,
        destination: impl Into<String>,
    ) -> Self {
        Self {
            guard: RedirectGuard::default(),
            store,
            channel,
            navigator,
            status,
            destination: destination.into(),
        }
    }

    /// End the session. Returns `true` if this call performed the redirect.
    pub fn trigger(&self, reason: ExpiryReason) -> bool {
        if !self.guard.fire() {
            debug!(%reason, "Session already expired, ignoring trigger");
            return false;
        }

        info!(%reason, destination = %self.destination, "Session ended, redirecting to login");
        self.status.set(SessionStatus::Expired);

        if let Err(e) = self.store.clear() {
            warn!(error = %e, "Failed to clear stored token");
        }
        self.channel.publish(&BroadcastMessage::SessionExpired);
        self.navigator.navigate(&self.destination);
        true
    }

    #[must_use]
    pub fn has_fired(&self) -> bool {
        self.guard.has_fired()
    }

    #[must_use]
    pub fn destination(&self) -> &str {
        &self.destination
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{LocalBus, MessageHandler};
    use crate::error::{Result, SessionError};
    use crate::store::{MemoryStorage, StorageBackend, StorageTier};
    use std::cell::RefCell;

    #[derive(Clone, Default)]
    struct CountingStorage {
        inner: MemoryStorage,
        removals: Rc<Cell<usize>>,
    }

    impl StorageBackend for CountingStorage {
        fn get(&self, key: &str) -> Result<Option<String>> {
            self.inner.get(key)
        }

        fn set(&self, key: &str, value: &str) -> Result<()> {
            self.inner.set(key, value)
        }

        fn remove(&self, key: &str) -> Result<()> {
            self.removals.set(self.removals.get() + 1);
            self.inner.remove(key)
        }
    }

    #[derive(Clone, Default)]
    struct RecordingNavigator {
        visits: Rc<RefCell<Vec<String>>>,
    }

    impl Navigator for RecordingNavigator {
        fn navigate(&self, destination: &str) {
            self.visits.borrow_mut().push(destination.to_string());
        }
    }

    struct Fixture {
        handler: ExpiryHandler,
        storage: CountingStorage,
        navigator: RecordingNavigator,
        bus: LocalBus,
        heard: Rc<RefCell<Vec<BroadcastMessage>>>,
        _subscription: crate::channel::Subscription,
    }

    fn fixture() -> Fixture {
        let storage = CountingStorage::default();
        let store = Rc::new(TokenStore::new(
            Rc::new(storage.clone()),
            Rc::new(MemoryStorage::new()),
            "token",
        ));
        store.persist("a.b.c", StorageTier::Durable).unwrap();
        storage.removals.set(0);

        let bus = LocalBus::new();
        let sibling = bus.endpoint();
        let heard = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&heard);
        let on_message: MessageHandler = Rc::new(move |m| sink.borrow_mut().push(*m));
        let subscription = sibling.subscribe(on_message);

        let navigator = RecordingNavigator::default();
        let handler = ExpiryHandler::new(
            store,
            Rc::new(bus.endpoint()),
            Rc::new(navigator.clone()),
            StatusCell::new(),
            "/login",
        );

        Fixture {
            handler,
            storage,
            navigator,
            bus,
            heard,
            _subscription: subscription,
        }
    }

    #[test]
    fn test_first_trigger_clears_broadcasts_and_navigates() {
        let f = fixture();
        assert!(f.handler.trigger(ExpiryReason::Failure(
            SessionFailure::LocallyExpired
        )));

        assert_eq!(f.storage.removals.get(), 1);
        assert!(f.storage.inner.is_empty());
        assert_eq!(*f.navigator.visits.borrow(), vec!["/login".to_string()]);
        f.bus.flush();
        assert_eq!(*f.heard.borrow(), vec![BroadcastMessage::SessionExpired]);
        assert!(f.handler.status.get().is_expired());
    }

    #[test]
    fn test_repeated_triggers_from_any_source_act_once() {
        let f = fixture();
        let reasons = [
            ExpiryReason::RemoteExpired,
            ExpiryReason::Failure(SessionFailure::RefreshRejected),
            ExpiryReason::Failure(SessionFailure::NoCredential),
            ExpiryReason::Logout,
            ExpiryReason::RemoteExpired,
        ];

        let performed: Vec<bool> = reasons.iter().map(|r| f.handler.trigger(*r)).collect();
        assert_eq!(performed, vec![true, false, false, false, false]);
        assert_eq!(f.storage.removals.get(), 1);
        assert_eq!(f.navigator.visits.borrow().len(), 1);
        assert_eq!(f.bus.flush(), 1);
    }

    #[test]
    fn test_storage_failure_still_redirects() {
        struct FailingStorage;
        impl StorageBackend for FailingStorage {
            fn get(&self, _key: &str) -> Result<Option<String>> {
                Ok(None)
            }
            fn set(&self, _key: &str, _value: &str) -> Result<()> {
                Ok(())
            }
            fn remove(&self, _key: &str) -> Result<()> {
                Err(SessionError::storage("denied"))
            }
        }

        let navigator = RecordingNavigator::default();
        let handler = ExpiryHandler::new(
            Rc::new(TokenStore::new(
                Rc::new(FailingStorage),
                Rc::new(FailingStorage),
                "token",
            )),
            Rc::new(crate::channel::NoopChannel),
            Rc::new(navigator.clone()),
            StatusCell::new(),
            "/login",
        );

        assert!(handler.trigger(ExpiryReason::Logout));
        assert_eq!(navigator.visits.borrow().len(), 1);
    }
}
