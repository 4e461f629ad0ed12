//! `BroadcastChannel` transport for cross-tab messages

use gloo::events::EventListener;
use std::rc::Rc;
use tabsession_core::channel::{
    BroadcastMessage, CrossTabChannel, MessageHandler, NoopChannel, Subscription,
};
use tabsession_core::{Result, SessionError};
use tracing::{debug, warn};
use wasm_bindgen::JsCast;
use web_sys::{BroadcastChannel, MessageEvent};

/// Cross-tab channel backed by the browser's `BroadcastChannel`.
///
/// Messages travel as plain JS objects (`{type: "activity", ts: 123}`).
pub struct WebChannel {
    channel: BroadcastChannel,
}

impl WebChannel {
    pub fn new(name: &str) -> Result<Self> {
        let channel = BroadcastChannel::new(name).map_err(|e| {
            SessionError::unavailable(format!("BroadcastChannel {name:?} ({e:?})"))
        })?;
        Ok(Self { channel })
    }
}

impl CrossTabChannel for WebChannel {
    fn publish(&self, message: &BroadcastMessage) {
        let value = match serde_wasm_bindgen::to_value(message) {
            Ok(value) => value,
            Err(e) => {
                warn!(?message, error = %e, "Failed to encode cross-tab message");
                return;
            }
        };
        if let Err(e) = self.channel.post_message(&value) {
            warn!(?message, error = ?e, "Failed to post cross-tab message");
        }
    }

    fn subscribe(&self, handler: MessageHandler) -> Subscription {
        let listener = EventListener::new(&self.channel, "message", move |event| {
            let Some(event) = event.dyn_ref::<MessageEvent>() else {
                return;
            };
            match serde_wasm_bindgen::from_value::<BroadcastMessage>(event.data()) {
                Ok(message) => handler(&message),
                // Other code may share the channel name.
                Err(e) => debug!(error = %e, "Ignoring unrecognised cross-tab message"),
            }
        });
        Subscription::new(move || drop(listener))
    }
}

impl Drop for WebChannel {
    fn drop(&mut self) {
        self.channel.close();
    }
}

/// Open the named channel, degrading to a tab-local no-op when
/// `BroadcastChannel` is unsupported
pub fn open(name: &str) -> Rc<dyn CrossTabChannel> {
    match WebChannel::new(name) {
        Ok(channel) => Rc::new(channel),
        Err(e) => {
            warn!(error = %e, "Cross-tab sync disabled");
            Rc::new(NoopChannel)
        }
    }
}
