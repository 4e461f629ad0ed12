//! `localStorage` / `sessionStorage` tiers

use tabsession_core::store::{MemoryStorage, StorageBackend, StorageTier};
use tabsession_core::{Result, SessionError};
use tracing::warn;
use wasm_bindgen::JsValue;
use web_sys::Storage;

fn js_error(action: &str, err: &JsValue) -> SessionError {
    SessionError::storage(format!("{action} failed: {err:?}"))
}

/// One browser storage area
pub struct WebStorage {
    storage: Storage,
}

impl WebStorage {
    /// `localStorage`, which survives browser restarts
    pub fn durable() -> Result<Self> {
        let storage = web_sys::window()
            .ok_or_else(|| SessionError::unavailable("window"))?
            .local_storage()
            .map_err(|e| js_error("opening localStorage", &e))?
            .ok_or_else(|| SessionError::unavailable("localStorage"))?;
        Ok(Self { storage })
    }

    /// `sessionStorage`, scoped to this tab
    pub fn per_tab() -> Result<Self> {
        let storage = web_sys::window()
            .ok_or_else(|| SessionError::unavailable("window"))?
            .session_storage()
            .map_err(|e| js_error("opening sessionStorage", &e))?
            .ok_or_else(|| SessionError::unavailable("sessionStorage"))?;
        Ok(Self { storage })
    }
}

impl StorageBackend for WebStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        self.storage
            .get_item(key)
            .map_err(|e| js_error("getItem", &e))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        // Throws when the quota is exceeded or storage is disabled.
        self.storage
            .set_item(key, value)
            .map_err(|e| js_error("setItem", &e))
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.storage
            .remove_item(key)
            .map_err(|e| js_error("removeItem", &e))
    }
}

/// Open `tier`, falling back to memory when the browser refuses access
/// (private mode, sandboxed iframes)
pub fn open_tier(tier: StorageTier) -> Box<dyn StorageBackend> {
    let opened = match tier {
        StorageTier::Durable => WebStorage::durable(),
        StorageTier::PerTab => WebStorage::per_tab(),
    };
    match opened {
        Ok(storage) => Box::new(storage),
        Err(e) => {
            warn!(%tier, error = %e, "Web storage unavailable, using memory");
            Box::new(MemoryStorage::new())
        }
    }
}
