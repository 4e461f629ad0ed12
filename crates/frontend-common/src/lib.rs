//! Browser bindings for tabsession

pub mod activity;
pub mod beacon;
pub mod channel;
pub mod client;
pub mod clock;
pub mod keeper;
pub mod logging;
pub mod navigator;
pub mod provider;
pub mod storage;

pub use keeper::SessionKeeper;
pub use logging::init_logging;
pub use provider::{SessionContext, SessionProvider, use_session, use_session_status};
pub use tabsession_core::{SessionConfig, SessionStatus};
