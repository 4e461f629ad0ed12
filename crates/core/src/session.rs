//! Per-tab session coordinator
//!
//! Wires the token store, activity tracker, cross-tab channel, refresh
//! scheduler, heartbeat emitter, and expiry handler together. Hosts drive it
//! with timers and DOM events; it owns no timers itself.

use crate::activity::ActivityTracker;
use crate::channel::{BroadcastMessage, CrossTabChannel, MessageHandler, NoopChannel, Subscription};
use crate::clock::{Clock, SystemClock};
use crate::config::SessionConfig;
use crate::error::{Result, SessionError};
use crate::expiry::{ExpiryHandler, ExpiryReason, Navigator};
use crate::heartbeat::{HeartbeatEmitter, HeartbeatTransport};
use crate::scheduler::{RefreshScheduler, SessionApi, TickOutcome, check_token};
use crate::status::{SessionStatus, StatusCell};
use crate::store::{StorageBackend, TokenStore};
use std::rc::{Rc, Weak};
use tracing::{debug, info, trace};

/// Session lifecycle of one tab
pub struct SessionCoordinator {
    config: SessionConfig,
    store: Rc<TokenStore>,
    activity: Rc<ActivityTracker>,
    channel: Rc<dyn CrossTabChannel>,
    expiry: Rc<ExpiryHandler>,
    scheduler: RefreshScheduler,
    heartbeat: HeartbeatEmitter,
    status: Rc<StatusCell>,
    clock: Rc<dyn Clock>,
}

impl SessionCoordinator {
    /// Start building a coordinator for `config`
    #[must_use]
    pub fn builder(config: SessionConfig) -> SessionCoordinatorBuilder {
        SessionCoordinatorBuilder::new(config)
    }

    /// Check the stored token once at mount.
    ///
    /// Ends the session immediately, without any network call, when there is
    /// no usable token. Returns `true` if the session is still active.
    pub fn check_on_mount(&self) -> bool {
        let now = self.clock.now_ms();
        match check_token(self.store.read().as_ref(), now) {
            Some(failure) => {
                info!(%failure, "No usable session at mount");
                self.expiry.trigger(ExpiryReason::Failure(failure));
                false
            }
            None => {
                debug!("Session valid at mount");
                true
            }
        }
    }

    /// Run one refresh check
    pub async fn tick(&self) -> TickOutcome {
        self.scheduler.tick().await
    }

    /// Send one liveness signal unless the session is over
    pub async fn heartbeat(&self) {
        if self.status.get().is_expired() {
            return;
        }
        self.heartbeat.emit().await;
    }

    /// Record a local interaction and tell the other tabs about it
    pub fn record_activity(&self) {
        if self.status.get().is_expired() {
            return;
        }
        let ts = self.activity.touch(self.clock.now_ms());
        self.channel.publish(&BroadcastMessage::Activity { ts });
    }

    /// React to a message from another tab
    pub fn handle_message(&self, message: &BroadcastMessage) {
        trace!(?message, "Cross-tab message received");
        match *message {
            BroadcastMessage::Activity { ts } => {
                self.activity.observe_remote(ts);
            }
            BroadcastMessage::TokenRefreshed => {
                debug!("Another tab refreshed the session token");
            }
            BroadcastMessage::SessionExpired => {
                self.expiry.trigger(ExpiryReason::RemoteExpired);
            }
        }
    }

    /// Subscribe this coordinator to its channel.
    ///
    /// The subscription only holds a weak reference, so dropping the last
    /// `Rc` of the coordinator is enough to stop message handling.
    pub fn attach(self: &Rc<Self>) -> Subscription {
        let weak: Weak<Self> = Rc::downgrade(self);
        let handler: MessageHandler = Rc::new(move |message| {
            if let Some(coordinator) = weak.upgrade() {
                coordinator.handle_message(message);
            }
        });
        self.channel.subscribe(handler)
    }

    /// End the session on user request
    pub fn logout(&self) -> bool {
        self.expiry.trigger(ExpiryReason::Logout)
    }

    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.status.get()
    }

    /// Observe status transitions until the handle is dropped
    pub fn watch_status(&self, watcher: impl Fn(SessionStatus) + 'static) -> Subscription {
        self.status.watch(watcher)
    }

    #[must_use]
    pub fn last_activity_ms(&self) -> i64 {
        self.activity.last()
    }

    #[must_use]
    pub fn store(&self) -> &TokenStore {
        &self.store
    }

    #[must_use]
    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }
}

/// Builder for [`SessionCoordinator`]
pub struct SessionCoordinatorBuilder {
    config: SessionConfig,
    durable: Option<Rc<dyn StorageBackend>>,
    per_tab: Option<Rc<dyn StorageBackend>>,
    channel: Option<Rc<dyn CrossTabChannel>>,
    api: Option<Rc<dyn SessionApi>>,
    heartbeat: Option<Rc<dyn HeartbeatTransport>>,
    navigator: Option<Rc<dyn Navigator>>,
    clock: Option<Rc<dyn Clock>>,
}

impl SessionCoordinatorBuilder {
    fn new(config: SessionConfig) -> Self {
        Self {
            config,
            durable: None,
            per_tab: None,
            channel: None,
            api: None,
            heartbeat: None,
            navigator: None,
            clock: None,
        }
    }

    /// Storage that survives browser restarts
    #[must_use]
    pub fn durable(mut self, storage: impl StorageBackend + 'static) -> Self {
        self.durable = Some(Rc::new(storage));
        self
    }

    /// Storage scoped to this tab
    #[must_use]
    pub fn per_tab(mut self, storage: impl StorageBackend + 'static) -> Self {
        self.per_tab = Some(Rc::new(storage));
        self
    }

    /// Cross-tab channel; defaults to [`NoopChannel`]
    #[must_use]
    pub fn channel(mut self, channel: Rc<dyn CrossTabChannel>) -> Self {
        self.channel = Some(channel);
        self
    }

    /// Refresh endpoint
    #[must_use]
    pub fn api(mut self, api: Rc<dyn SessionApi>) -> Self {
        self.api = Some(api);
        self
    }

    /// Heartbeat delivery
    #[must_use]
    pub fn heartbeat(mut self, transport: Rc<dyn HeartbeatTransport>) -> Self {
        self.heartbeat = Some(transport);
        self
    }

    /// Page navigation used on expiry
    #[must_use]
    pub fn navigator(mut self, navigator: impl Navigator + 'static) -> Self {
        self.navigator = Some(Rc::new(navigator));
        self
    }

    /// Time source; defaults to [`SystemClock`]
    #[must_use]
    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Some(Rc::new(clock));
        self
    }

    /// Build the coordinator, seeding the activity tracker with "now"
    pub fn build(self) -> Result<SessionCoordinator> {
        let durable = self.durable.ok_or(SessionError::MissingComponent("durable storage"))?;
        let per_tab = self.per_tab.ok_or(SessionError::MissingComponent("per-tab storage"))?;
        let api = self.api.ok_or(SessionError::MissingComponent("refresh api"))?;
        let transport = self
            .heartbeat
            .ok_or(SessionError::MissingComponent("heartbeat transport"))?;
        let navigator = self
            .navigator
            .ok_or(SessionError::MissingComponent("navigator"))?;
        let channel = self
            .channel
            .unwrap_or_else(|| Rc::new(NoopChannel) as Rc<dyn CrossTabChannel>);
        let clock = self
            .clock
            .unwrap_or_else(|| Rc::new(SystemClock) as Rc<dyn Clock>);

        let config = self.config;
        let store = Rc::new(TokenStore::new(durable, per_tab, config.storage_key.clone()));
        let activity = Rc::new(ActivityTracker::new(clock.now_ms()));
        let status = StatusCell::new();
        let expiry = Rc::new(ExpiryHandler::new(
            Rc::clone(&store),
            Rc::clone(&channel),
            navigator,
            Rc::clone(&status),
            config.login_path.clone(),
        ));
        let scheduler = RefreshScheduler::new(
            config.refresh_policy(),
            Rc::clone(&store),
            Rc::clone(&activity),
            api,
            Rc::clone(&channel),
            Rc::clone(&expiry),
            Rc::clone(&status),
            Rc::clone(&clock),
        );

        Ok(SessionCoordinator {
            config,
            store,
            activity,
            channel,
            expiry,
            scheduler,
            heartbeat: HeartbeatEmitter::new(transport),
            status,
            clock,
        })
    }
}
