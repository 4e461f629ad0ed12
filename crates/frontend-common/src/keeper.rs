//! Mount-scoped session lifecycle for a browser tab
//!
//! A [`SessionKeeper`] owns every timer, DOM listener, and channel
//! subscription the session needs. Dropping it releases all of them.

use crate::activity;
use crate::beacon::BeaconHeartbeat;
use crate::channel;
use crate::client::create_session_client;
use crate::clock::BrowserClock;
use crate::navigator::LocationNavigator;
use crate::storage::open_tier;
use gloo::events::EventListener;
use gloo::timers::callback::Interval;
use std::rc::{Rc, Weak};
use tabsession_core::validation::ValidateConfig;
use tabsession_core::{
    SessionConfig, SessionCoordinator, SessionError, SessionStatus, StorageTier, Subscription,
};
use tracing::{debug, info};
use wasm_bindgen_futures::spawn_local;

pub struct SessionKeeper {
    // Fields drop in declaration order. Callbacks only hold the coordinator
    // weakly, so once these are gone only in-flight ticks can keep it alive.
    _tick: Option<Interval>,
    _heartbeat: Option<Interval>,
    _listeners: Vec<EventListener>,
    _messages: Subscription,
    session: Rc<SessionCoordinator>,
}

impl SessionKeeper {
    /// Start the session lifecycle for this tab.
    ///
    /// The stored token is checked immediately; a missing or expired token
    /// redirects to the login page without any network call, and no timers
    /// are started.
    pub fn mount(config: SessionConfig) -> Result<Self, SessionError> {
        config.validate()?;

        let client = create_session_client(&config)
            .map_err(|e| SessionError::transport(e.to_string()))?;
        let beacon = BeaconHeartbeat::new(client.heartbeat_url());
        let session = SessionCoordinator::builder(config.clone())
            .durable(open_tier(StorageTier::Durable))
            .per_tab(open_tier(StorageTier::PerTab))
            .channel(channel::open(&config.channel_name))
            .api(Rc::new(client))
            .heartbeat(Rc::new(beacon))
            .navigator(LocationNavigator)
            .clock(BrowserClock)
            .build()?;
        let session = Rc::new(session);
        let messages = session.attach();

        if !session.check_on_mount() {
            return Ok(Self {
                session,
                _tick: None,
                _heartbeat: None,
                _listeners: Vec::new(),
                _messages: messages,
            });
        }

        let tick = every(config.tick_interval_ms, &session, |session| async move {
            let outcome = session.tick().await;
            debug!(?outcome, "Tick finished");
        });
        let heartbeat = every(config.heartbeat_interval_ms, &session, |session| async move {
            session.heartbeat().await;
        });
        let listeners = activity::listen(&session)?;

        info!(
            tick_ms = config.tick_interval_ms,
            heartbeat_ms = config.heartbeat_interval_ms,
            "Session keeper mounted"
        );
        Ok(Self {
            session,
            _tick: Some(tick),
            _heartbeat: Some(heartbeat),
            _listeners: listeners,
            _messages: messages,
        })
    }

    /// Log out in this tab and every sibling tab
    pub fn logout(&self) -> bool {
        self.session.logout()
    }

    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.session.status()
    }

    /// Observe status transitions until the handle is dropped
    pub fn watch_status(&self, watcher: impl Fn(SessionStatus) + 'static) -> Subscription {
        self.session.watch_status(watcher)
    }

    #[must_use]
    pub const fn session(&self) -> &Rc<SessionCoordinator> {
        &self.session
    }
}

impl Drop for SessionKeeper {
    fn drop(&mut self) {
        debug!(status = %self.session.status(), "Session keeper unmounted");
    }
}

/// Run `job` every `period_ms` on the event loop while the session lives
fn every<F, Fut>(period_ms: u64, session: &Rc<SessionCoordinator>, job: F) -> Interval
where
    F: Fn(Rc<SessionCoordinator>) -> Fut + 'static,
    Fut: std::future::Future<Output = ()> + 'static,
{
    let weak: Weak<SessionCoordinator> = Rc::downgrade(session);
    let period = u32::try_from(period_ms).unwrap_or(u32::MAX >> 1);
    Interval::new(period, move || {
        if let Some(session) = weak.upgrade() {
            spawn_local(job(session));
        }
    })
}
