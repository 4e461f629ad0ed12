//! Page navigation through `window.location`

use tabsession_core::Navigator;
use tracing::error;

/// Navigates by assigning `location.href`, which keeps a history entry
#[derive(Debug, Clone, Copy, Default)]
pub struct LocationNavigator;

impl Navigator for LocationNavigator {
    fn navigate(&self, destination: &str) {
        let Some(window) = web_sys::window() else {
            error!(%destination, "No window to navigate");
            return;
        };
        if let Err(e) = window.location().set_href(destination) {
            error!(%destination, error = ?e, "Navigation failed");
        }
    }
}
