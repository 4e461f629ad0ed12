//! Periodic refresh decision and execution

use crate::activity::ActivityTracker;
use crate::channel::{BroadcastMessage, CrossTabChannel};
use crate::clock::Clock;
use crate::config::RefreshPolicy;
use crate::error::{RefreshError, SessionFailure};
use crate::expiry::{ExpiryHandler, ExpiryReason};
use crate::status::{SessionStatus, StatusCell};
use crate::store::TokenStore;
use crate::token::Token;
use async_trait::async_trait;
use std::rc::Rc;
use tracing::{debug, info, warn};

/// Backend renewal endpoint
#[async_trait(?Send)]
pub trait SessionApi {
    /// Exchange the current token for a new one
    async fn refresh(&self, current: &str) -> Result<String, RefreshError>;
}

/// What a tick should do, decided from local state only
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickPlan {
    /// The session is over
    Expire(SessionFailure),
    /// The user is idle; let the token run out
    Idle,
    /// The token is not close to expiry yet
    Fresh,
    /// Call the refresh endpoint
    Refresh,
}

/// What a tick actually did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Tab already expired, or a refresh is still in flight
    Skipped,
    /// Local check ended the session
    Expired,
    Idle,
    Fresh,
    /// New token stored and announced
    Refreshed,
    /// Refresh failed transiently; the token is still valid
    Retrying,
    /// Backend answered 401
    Rejected,
}

/// Terminal failure for `token` at `now_ms`, if any
#[must_use]
pub fn check_token(token: Option<&Token>, now_ms: i64) -> Option<SessionFailure> {
    match token {
        None => Some(SessionFailure::NoCredential),
        Some(token) if !token.is_decodable() => Some(SessionFailure::MalformedToken),
        Some(token) if token.is_expired(now_ms) => Some(SessionFailure::LocallyExpired),
        Some(_) => None,
    }
}

/// Decide a tick: expiry first, then idleness, then proximity to expiry
#[must_use]
pub fn plan_tick(
    token: Option<&Token>,
    last_activity_ms: i64,
    now_ms: i64,
    policy: RefreshPolicy,
) -> TickPlan {
    if let Some(failure) = check_token(token, now_ms) {
        return TickPlan::Expire(failure);
    }
    if now_ms - last_activity_ms > policy.idle_threshold_ms {
        return TickPlan::Idle;
    }
    match token.and_then(|t| t.remaining_ms(now_ms)) {
        Some(remaining) if remaining <= policy.refresh_skew_ms => TickPlan::Refresh,
        _ => TickPlan::Fresh,
    }
}

/// Executes ticks against the shared session components
pub struct RefreshScheduler {
    policy: RefreshPolicy,
    store: Rc<TokenStore>,
    activity: Rc<ActivityTracker>,
    api: Rc<dyn SessionApi>,
    channel: Rc<dyn CrossTabChannel>,
    expiry: Rc<ExpiryHandler>,
    status: Rc<StatusCell>,
    clock: Rc<dyn Clock>,
}

impl RefreshScheduler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        policy: RefreshPolicy,
        store: Rc<TokenStore>,
        activity: Rc<ActivityTracker>,
        api: Rc<dyn SessionApi>,
        channel: Rc<dyn CrossTabChannel>,
        expiry: Rc<ExpiryHandler>,
        status: Rc<StatusCell>,
        clock: Rc<dyn Clock>,
    ) -> Self {
        Self {
            policy,
            store,
            activity,
            api,
            channel,
            expiry,
            status,
            clock,
        }
    }

    /// Run one scheduler tick.
    ///
    /// The local expiry check runs even while a refresh is in flight; only
    /// the refresh decision is skipped then.
    pub async fn tick(&self) -> TickOutcome {
        let status = self.status.get();
        if status.is_expired() {
            debug!("Skipping tick, session already expired");
            return TickOutcome::Skipped;
        }

        let now = self.clock.now_ms();
        let token = self.store.read();
        if let Some(failure) = check_token(token.as_ref(), now) {
            self.end_session(failure);
            return TickOutcome::Expired;
        }
        if status == SessionStatus::Refreshing {
            debug!("Refresh still in flight, skipping tick");
            return TickOutcome::Skipped;
        }

        let plan = plan_tick(token.as_ref(), self.activity.last(), now, self.policy);
        debug!(?plan, "Refresh tick");

        match (plan, token) {
            (TickPlan::Expire(failure), _) => {
                self.end_session(failure);
                TickOutcome::Expired
            }
            (TickPlan::Idle, _) => TickOutcome::Idle,
            (TickPlan::Refresh, Some(token)) => self.refresh(&token).await,
            (TickPlan::Fresh | TickPlan::Refresh, _) => TickOutcome::Fresh,
        }
    }

    fn end_session(&self, failure: SessionFailure) {
        debug_assert!(failure.is_terminal());
        self.expiry.trigger(ExpiryReason::Failure(failure));
    }

    async fn refresh(&self, token: &Token) -> TickOutcome {
        self.status.set(SessionStatus::Refreshing);
        let result = self.api.refresh(token.raw()).await;

        if self.expiry.has_fired() {
            debug!("Discarding refresh response that arrived after expiry");
            return TickOutcome::Skipped;
        }

        match result {
            Ok(renewed) => {
                self.status.set(SessionStatus::Active);
                match self.store.write(&renewed) {
                    Ok(Some(tier)) => {
                        info!(%tier, "Session token refreshed");
                        self.channel.publish(&BroadcastMessage::TokenRefreshed);
                    }
                    Ok(None) => debug!("Token vanished during refresh, not storing renewal"),
                    Err(e) => warn!(error = %e, "Failed to store refreshed token"),
                }
                TickOutcome::Refreshed
            }
            Err(err) => {
                let failure = SessionFailure::from(&err);
                if failure.is_terminal() {
                    warn!(%failure, "Refresh rejected, ending session");
                    self.end_session(failure);
                    return TickOutcome::Rejected;
                }

                // A transient failure only ends the session if the token
                // lapsed while the call was pending.
                match check_token(self.store.read().as_ref(), self.clock.now_ms()) {
                    Some(lapsed) => {
                        warn!(%failure, error = %err, %lapsed, "Refresh failed and the session has lapsed");
                        self.end_session(lapsed);
                        TickOutcome::Expired
                    }
                    None => {
                        self.status.set(SessionStatus::Active);
                        warn!(%failure, error = %err, "Refresh failed, retrying on next tick");
                        TickOutcome::Retrying
                    }
                }
            }
        }
    }
}
