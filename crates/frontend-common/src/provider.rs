//! Session context and provider

use crate::keeper::SessionKeeper;
use std::rc::Rc;
use tabsession_core::{SessionConfig, SessionStatus};
use tracing::error;
use yew::prelude::*;

/// Session state as seen by components
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct SessionState {
    pub status: SessionStatus,
    pub mounted: bool,
    pub error: Option<String>,
}

/// Session state actions
pub enum SessionAction {
    Mounted(SessionStatus),
    StatusChanged(SessionStatus),
    MountFailed(String),
}

impl Reducible for SessionState {
    type Action = SessionAction;

    fn reduce(self: Rc<Self>, action: Self::Action) -> Rc<Self> {
        match action {
            SessionAction::Mounted(status) => Rc::new(Self {
                status,
                mounted: true,
                error: None,
            }),
            SessionAction::StatusChanged(status) if status == self.status => self,
            SessionAction::StatusChanged(status) => Rc::new(Self {
                status,
                ..(*self).clone()
            }),
            SessionAction::MountFailed(error) => Rc::new(Self {
                mounted: false,
                error: Some(error),
                ..(*self).clone()
            }),
        }
    }
}

/// Session context data
#[derive(Clone, PartialEq)]
pub struct SessionContext {
    pub state: UseReducerHandle<SessionState>,
    /// Ends the session in every tab
    pub logout: Callback<()>,
}

/// Session provider props
#[derive(Properties, PartialEq)]
pub struct SessionProviderProps {
    #[prop_or_default]
    pub config: SessionConfig,
    pub children: Children,
}

/// Keeps the session alive for as long as it is mounted
#[function_component(SessionProvider)]
pub fn session_provider(props: &SessionProviderProps) -> Html {
    let state = use_reducer(SessionState::default);
    let keeper = use_mut_ref(|| None::<SessionKeeper>);

    {
        let state = state.clone();
        let keeper = keeper.clone();
        use_effect_with(props.config.clone(), move |config| {
            let cleanup: Box<dyn FnOnce()> = match SessionKeeper::mount(config.clone()) {
                Ok(mounted) => {
                    let dispatcher = state.dispatcher();
                    let watch = mounted.watch_status(move |status| {
                        dispatcher.dispatch(SessionAction::StatusChanged(status));
                    });
                    state.dispatch(SessionAction::Mounted(mounted.status()));
                    *keeper.borrow_mut() = Some(mounted);

                    Box::new(move || {
                        drop(watch);
                        keeper.borrow_mut().take();
                    })
                }
                Err(e) => {
                    error!(error = %e, "Failed to start session keeper");
                    state.dispatch(SessionAction::MountFailed(e.to_string()));
                    Box::new(|| {})
                }
            };
            cleanup
        });
    }

    let logout = {
        let keeper = keeper.clone();
        use_callback((), move |_: (), _: &()| {
            if let Some(keeper) = keeper.borrow().as_ref() {
                keeper.logout();
            }
        })
    };

    let context = SessionContext { state, logout };

    html! {
        <ContextProvider<SessionContext> context={context}>
            {props.children.clone()}
        </ContextProvider<SessionContext>>
    }
}

/// Hook to use session context
#[hook]
pub fn use_session() -> SessionContext {
    use_context::<SessionContext>()
        .expect("SessionContext not found. Make sure to wrap your component with SessionProvider")
}

/// Hook to get the current session status
#[hook]
pub fn use_session_status() -> SessionStatus {
    let session = use_session();
    session.state.status
}
