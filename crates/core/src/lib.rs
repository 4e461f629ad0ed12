//! Tabsession core: per-tab session lifecycle coordination
//!
//! Everything here is platform-agnostic. Browser bindings for storage,
//! cross-tab messaging, navigation, and timers live in
//! `tabsession-frontend-common`.

pub mod activity;
pub mod channel;
#[cfg(feature = "client")]
pub mod client;
pub mod clock;
pub mod config;
pub mod error;
pub mod expiry;
pub mod heartbeat;
pub mod scheduler;
pub mod session;
pub mod status;
pub mod store;
pub mod token;
pub mod validation;

pub use channel::{BroadcastMessage, CrossTabChannel, LocalBus, NoopChannel, Subscription};
#[cfg(feature = "client")]
pub use client::{ClientError, SessionClient};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{RefreshPolicy, SessionConfig};
pub use error::{RefreshError, Result, SessionError, SessionFailure};
pub use expiry::{ExpiryReason, Navigator};
pub use heartbeat::HeartbeatTransport;
pub use scheduler::{SessionApi, TickOutcome};
pub use session::{SessionCoordinator, SessionCoordinatorBuilder};
pub use status::SessionStatus;
pub use store::{MemoryStorage, StorageBackend, StorageTier, TokenStore};
pub use token::Token;
