//! Best-effort liveness signal, independent of token renewal

use crate::error::{Result, SessionFailure};
use async_trait::async_trait;
use std::rc::Rc;
use tracing::{debug, trace};

/// Delivers one liveness signal to the backend
#[async_trait(?Send)]
pub trait HeartbeatTransport {
    async fn send(&self) -> Result<()>;
}

/// Fire-and-forget heartbeat sender. Failures are logged and dropped.
pub struct HeartbeatEmitter {
    transport: Rc<dyn HeartbeatTransport>,
}

impl HeartbeatEmitter {
    pub fn new(transport: Rc<dyn HeartbeatTransport>) -> Self {
        Self { transport }
    }

    /// Send one heartbeat. A failed send is reported, never escalated.
    pub async fn emit(&self) -> Option<SessionFailure> {
        match self.transport.send().await {
            Ok(()) => {
                trace!("Heartbeat sent");
                None
            }
            Err(e) => {
                let failure = SessionFailure::HeartbeatFailure;
                debug!(%failure, error = %e, "Heartbeat dropped");
                Some(failure)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SessionError;
    use std::cell::Cell;

    struct FlakyTransport {
        calls: Cell<usize>,
    }

    #[async_trait(?Send)]
    impl HeartbeatTransport for FlakyTransport {
        async fn send(&self) -> Result<()> {
            self.calls.set(self.calls.get() + 1);
            if self.calls.get() % 2 == 0 {
                Err(SessionError::transport("connection reset"))
            } else {
                Ok(())
            }
        }
    }

    #[tokio::test]
    async fn test_failures_are_swallowed_and_next_beat_still_sends() {
        let transport = Rc::new(FlakyTransport {
            calls: Cell::new(0),
        });
        let emitter = HeartbeatEmitter::new(transport.clone());

        let mut outcomes = Vec::new();
        for _ in 0..4 {
            outcomes.push(emitter.emit().await);
        }
        assert_eq!(transport.calls.get(), 4);
        assert_eq!(
            outcomes,
            vec![
                None,
                Some(SessionFailure::HeartbeatFailure),
                None,
                Some(SessionFailure::HeartbeatFailure),
            ]
        );
        assert!(!SessionFailure::HeartbeatFailure.is_terminal());
    }
}
