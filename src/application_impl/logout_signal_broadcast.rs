use crate::domain_model::LogoutEvent;
use crate::domain_port::LogoutSignal;
use tokio::sync::broadcast;

/// Fans logout events out to every subscriber, e.g. the UI shell that
/// navigates to the sign-in page.
pub struct BroadcastLogoutSignal {
    tx: broadcast::Sender<LogoutEvent>,
}

impl BroadcastLogoutSignal {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LogoutEvent> {
        self.tx.subscribe()
    }
}

impl LogoutSignal for BroadcastLogoutSignal {
    fn signal(&self, event: LogoutEvent) {
        let redirect_to = event.redirect_to.clone();
        if self.tx.send(event).is_err() {
            tracing::debug!(%redirect_to, "logout signalled with no listener");
        }
    }
}
