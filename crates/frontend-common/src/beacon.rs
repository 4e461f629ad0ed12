//! Fire-and-forget heartbeat delivery

use async_trait::async_trait;
use tabsession_core::heartbeat::HeartbeatTransport;
use tabsession_core::{Result, SessionError};
use tracing::trace;
use wasm_bindgen_futures::JsFuture;
use web_sys::{RequestCredentials, RequestInit};

/// Heartbeat sent with `navigator.sendBeacon`, or a keepalive `fetch` when
/// the beacon is refused. Neither is awaited for a response.
pub struct BeaconHeartbeat {
    url: String,
}

impl BeaconHeartbeat {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait(?Send)]
impl HeartbeatTransport for BeaconHeartbeat {
    async fn send(&self) -> Result<()> {
        let window = web_sys::window().ok_or_else(|| SessionError::unavailable("window"))?;

        if let Ok(true) = window.navigator().send_beacon(&self.url) {
            trace!(url = %self.url, "Heartbeat beacon queued");
            return Ok(());
        }

        let init = RequestInit::new();
        init.set_method("POST");
        init.set_keepalive(true);
        init.set_credentials(RequestCredentials::Include);
        let request = window.fetch_with_str_and_init(&self.url, &init);

        // Swallow the outcome so a rejected promise never reaches the console.
        wasm_bindgen_futures::spawn_local(async move {
            let _ = JsFuture::from(request).await;
        });
        trace!(url = %self.url, "Heartbeat sent with keepalive fetch");
        Ok(())
    }
}
