//! Client configuration and initialization

pub use tabsession_core::client::ClientError;
use tabsession_core::client::SessionClient;
use tabsession_core::SessionConfig;
use web_sys::window;

/// Get the page origin, or an empty string outside a browsing context
fn page_origin() -> String {
    window()
        .and_then(|w| w.location().origin().ok())
        .unwrap_or_default()
}

/// Absolute backend base URL for `config`.
///
/// An empty or origin-relative `backend_url` is resolved against the page
/// origin, since `fetch` through reqwest needs absolute URLs.
#[must_use]
pub fn resolve_base_url(config: &SessionConfig) -> String {
    let backend = config.backend_url.trim_end_matches('/');
    if backend.is_empty() || backend.starts_with('/') {
        format!("{}{backend}", page_origin())
    } else {
        backend.to_string()
    }
}

/// Create the client for the refresh endpoint
pub fn create_session_client(config: &SessionConfig) -> Result<SessionClient, ClientError> {
    SessionClient::builder()
        .base_url(resolve_base_url(config))
        .build()
}
