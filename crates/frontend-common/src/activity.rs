//! DOM interaction listeners feeding the activity tracker

use gloo::events::{EventListener, EventListenerOptions};
use std::rc::{Rc, Weak};
use tabsession_core::{Result, SessionCoordinator, SessionError};
use web_sys::VisibilityState;

/// Window events that count as user interaction
pub const INTERACTION_EVENTS: [&str; 4] = ["keydown", "pointerdown", "scroll", "focus"];

fn options_for(event: &str) -> EventListenerOptions {
    // Scroll does not bubble from inner scroll containers.
    if event == "scroll" {
        EventListenerOptions::run_in_capture_phase()
    } else {
        EventListenerOptions::default()
    }
}

/// Listen for interaction on the window and for the tab becoming visible.
///
/// Listeners hold the coordinator weakly and are removed when dropped.
pub fn listen(session: &Rc<SessionCoordinator>) -> Result<Vec<EventListener>> {
    let window = web_sys::window().ok_or_else(|| SessionError::unavailable("window"))?;
    let document = window
        .document()
        .ok_or_else(|| SessionError::unavailable("document"))?;

    let mut listeners: Vec<EventListener> = INTERACTION_EVENTS
        .iter()
        .map(|&event| {
            let weak = Rc::downgrade(session);
            EventListener::new_with_options(&window, event, options_for(event), move |_| {
                touch(&weak);
            })
        })
        .collect();

    let weak = Rc::downgrade(session);
    let visible_document = document.clone();
    listeners.push(EventListener::new(&document, "visibilitychange", move |_| {
        if visible_document.visibility_state() == VisibilityState::Visible {
            touch(&weak);
        }
    }));

    Ok(listeners)
}

fn touch(session: &Weak<SessionCoordinator>) {
    if let Some(session) = session.upgrade() {
        session.record_activity();
    }
}
