use crate::domain_model::LogoutEvent;

pub trait LogoutSignal: Send + Sync {
    fn signal(&self, event: LogoutEvent);
}

impl<F> LogoutSignal for F
where
    F: Fn(LogoutEvent) + Send + Sync,
{
    fn signal(&self, event: LogoutEvent) {
        self(event)
    }
}
