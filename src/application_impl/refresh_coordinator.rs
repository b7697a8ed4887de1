//! Single-flight coordination of token refresh cycles.
//!
//! The first caller that observes an expired session while the coordinator is
//! idle becomes the leader and owns a [`RefreshLease`]. Everyone arriving
//! while the lease is alive is queued and woken in arrival order when the
//! leader settles the cycle. State transitions happen under a plain mutex that
//! is never held across an `.await`.

use crate::domain_model::AccessToken;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::oneshot;

pub type RefreshOutcome = Result<AccessToken, RefreshFailure>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RefreshFailure {
    #[error("{0}")]
    SessionEnded(String),
    #[error("refresh abandoned before completion")]
    Abandoned,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshPhase {
    Idle,
    Refreshing,
    Failed,
}

struct Subscriber {
    id: u64,
    tx: oneshot::Sender<RefreshOutcome>,
}

enum State {
    Idle,
    Refreshing {
        subscribers: VecDeque<Subscriber>,
    },
    // Session teardown in progress; subscribers are released once it is done.
    Failed {
        failure: RefreshFailure,
        subscribers: VecDeque<Subscriber>,
    },
}

struct Inner {
    state: State,
    // Bumped every time a cycle settles with a new session state or the
    // session is ended from outside the cycle.
    generation: u64,
    next_subscriber: u64,
}

pub struct RefreshCoordinator {
    inner: Mutex<Inner>,
}

pub enum Ticket<'a> {
    /// Caller must run the refresh and settle the lease.
    Lead(RefreshLease<'a>),
    /// A refresh is in flight; wait for its outcome.
    Wait(Subscription),
    /// A cycle settled after the caller read its token; retry with the
    /// current session instead of refreshing again.
    Superseded,
    /// The session is being torn down.
    Rejected(RefreshFailure),
}

impl RefreshCoordinator {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: State::Idle,
                generation: 0,
                next_subscriber: 0,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    pub fn phase(&self) -> RefreshPhase {
        match self.lock().state {
            State::Idle => RefreshPhase::Idle,
            State::Refreshing { .. } => RefreshPhase::Refreshing,
            State::Failed { .. } => RefreshPhase::Failed,
        }
    }

    /// Subscribers still waiting on the current cycle.
    pub fn queued(&self) -> usize {
        match &self.lock().state {
            State::Idle => 0,
            State::Refreshing { subscribers } | State::Failed { subscribers, .. } => {
                subscribers.iter().filter(|s| !s.tx.is_closed()).count()
            }
        }
    }

    /// Report an authentication failure seen by a request that was
    /// dispatched at `observed_generation`.
    pub fn join(&self, observed_generation: u64) -> Ticket<'_> {
        let mut guard = self.lock();
        let inner = &mut *guard;

        match &mut inner.state {
            State::Refreshing { subscribers } => {
                let id = inner.next_subscriber;
                inner.next_subscriber += 1;
                let (tx, rx) = oneshot::channel();
                subscribers.push_back(Subscriber { id, tx });
                tracing::debug!(subscriber = id, queued = subscribers.len(), "queued behind refresh");
                return Ticket::Wait(Subscription { id, rx });
            }
            State::Failed { failure, .. } => return Ticket::Rejected(failure.clone()),
            State::Idle => {}
        }

        if inner.generation != observed_generation {
            return Ticket::Superseded;
        }

        inner.state = State::Refreshing {
            subscribers: VecDeque::new(),
        };
        Ticket::Lead(RefreshLease {
            coordinator: self,
            cycle: inner.generation,
            settled: false,
        })
    }

    /// End the session from outside a refresh cycle, e.g. on logout. Any
    /// running cycle loses its lease: its waiters get `failure` now and
    /// whatever the leader does afterwards leaves the coordinator alone.
    pub fn revoke(&self, failure: RefreshFailure) {
        let subscribers = {
            let mut inner = self.lock();
            inner.generation += 1;
            take_subscribers(&mut inner.state)
        };
        if !subscribers.is_empty() {
            tracing::debug!(queued = subscribers.len(), "refresh cycle revoked");
        }
        notify(subscribers, Err(failure));
    }

    fn is_current(&self, cycle: u64) -> bool {
        let inner = self.lock();
        inner.generation == cycle && !matches!(inner.state, State::Idle)
    }

    /// Returns false when the cycle was revoked before it could settle.
    fn settle(&self, cycle: u64, outcome: RefreshOutcome, advance: bool) -> bool {
        let subscribers = {
            let mut inner = self.lock();
            if inner.generation != cycle || matches!(inner.state, State::Idle) {
                return false;
            }
            if advance {
                inner.generation += 1;
            }
            take_subscribers(&mut inner.state)
        };
        notify(subscribers, outcome);
        true
    }
}

fn take_subscribers(state: &mut State) -> VecDeque<Subscriber> {
    match std::mem::replace(state, State::Idle) {
        State::Refreshing { subscribers } | State::Failed { subscribers, .. } => subscribers,
        State::Idle => VecDeque::new(),
    }
}

fn notify(subscribers: VecDeque<Subscriber>, outcome: RefreshOutcome) {
    for subscriber in subscribers {
        if subscriber.tx.send(outcome.clone()).is_err() {
            tracing::trace!(subscriber = subscriber.id, "subscriber left before refresh settled");
        }
    }
}

impl Default for RefreshCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

/// Exclusive right to run the current refresh cycle. Dropping it unsettled
/// releases the queue with [`RefreshFailure::Abandoned`].
pub struct RefreshLease<'a> {
    coordinator: &'a RefreshCoordinator,
    cycle: u64,
    settled: bool,
}

impl RefreshLease<'_> {
    /// False once the cycle has been revoked.
    pub fn is_current(&self) -> bool {
        self.coordinator.is_current(self.cycle)
    }

    /// Move to the failed phase. Queued subscribers stay queued and newcomers
    /// are rejected until [`RefreshLease::fail`] is called.
    pub fn begin_teardown(&self, failure: RefreshFailure) {
        let mut inner = self.coordinator.lock();
        if inner.generation != self.cycle {
            return;
        }
        inner.state = match std::mem::replace(&mut inner.state, State::Idle) {
            State::Refreshing { subscribers } => State::Failed {
                failure,
                subscribers,
            },
            other => other,
        };
    }

    /// Hand the new token to the queue. Returns false if the cycle was
    /// revoked, in which case nobody received it.
    #[must_use]
    pub fn succeed(mut self, access_token: AccessToken) -> bool {
        self.settled = true;
        self.coordinator.settle(self.cycle, Ok(access_token), true)
    }

    /// Returns false if the cycle was revoked first.
    #[must_use]
    pub fn fail(mut self, failure: RefreshFailure) -> bool {
        self.settled = true;
        self.coordinator.settle(self.cycle, Err(failure), true)
    }
}

impl Drop for RefreshLease<'_> {
    fn drop(&mut self) {
        if !self.settled
            && self
                .coordinator
                .settle(self.cycle, Err(RefreshFailure::Abandoned), false)
        {
            tracing::warn!("refresh cycle dropped before settling");
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WaitError {
    #[error("refresh token timeout")]
    Timeout,
    #[error(transparent)]
    Failed(#[from] RefreshFailure),
}

pub struct Subscription {
    id: u64,
    rx: oneshot::Receiver<RefreshOutcome>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Wait for the cycle to settle, giving up after `bound`. Giving up does
    /// not affect the cycle or other subscribers.
    pub async fn wait(self, bound: Duration) -> Result<AccessToken, WaitError> {
        match tokio::time::timeout(bound, self.rx).await {
            Err(_) => Err(WaitError::Timeout),
            Ok(Ok(outcome)) => outcome.map_err(WaitError::Failed),
            Ok(Err(_)) => Err(WaitError::Failed(RefreshFailure::Abandoned)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(s: &str) -> AccessToken {
        AccessToken(s.to_string())
    }

    fn lead(coordinator: &RefreshCoordinator) -> RefreshLease<'_> {
        match coordinator.join(coordinator.generation()) {
            Ticket::Lead(lease) => lease,
            _ => panic!("expected to lead the refresh"),
        }
    }

    fn subscribe(coordinator: &RefreshCoordinator) -> Subscription {
        match coordinator.join(coordinator.generation()) {
            Ticket::Wait(subscription) => subscription,
            _ => panic!("expected to wait on the refresh"),
        }
    }

    #[tokio::test]
    async fn only_the_first_failure_leads() {
        let coordinator = RefreshCoordinator::new();
        let lease = lead(&coordinator);
        let first = subscribe(&coordinator);
        let second = subscribe(&coordinator);

        assert_eq!(coordinator.phase(), RefreshPhase::Refreshing);
        assert_eq!(coordinator.queued(), 2);
        assert!(first.id() < second.id());

        assert!(lease.succeed(token("a2")));

        let bound = Duration::from_secs(1);
        assert_eq!(first.wait(bound).await, Ok(token("a2")));
        assert_eq!(second.wait(bound).await, Ok(token("a2")));
        assert_eq!(coordinator.phase(), RefreshPhase::Idle);
        assert_eq!(coordinator.generation(), 1);
    }

    #[tokio::test]
    async fn failure_after_teardown_rejects_queue_and_newcomers() {
        let coordinator = RefreshCoordinator::new();
        let lease = lead(&coordinator);
        let queued = subscribe(&coordinator);

        let failure = RefreshFailure::SessionEnded("refresh endpoint answered 400".into());
        lease.begin_teardown(failure.clone());
        assert_eq!(coordinator.phase(), RefreshPhase::Failed);
        assert!(matches!(coordinator.join(0), Ticket::Rejected(f) if f == failure));

        assert!(lease.fail(failure.clone()));
        assert_eq!(
            queued.wait(Duration::from_secs(1)).await,
            Err(WaitError::Failed(failure))
        );
        assert_eq!(coordinator.phase(), RefreshPhase::Idle);
    }

    #[test]
    fn stale_generation_is_superseded() {
        let coordinator = RefreshCoordinator::new();
        let observed = coordinator.generation();
        assert!(lead(&coordinator).succeed(token("a2")));

        assert!(matches!(coordinator.join(observed), Ticket::Superseded));
        assert!(matches!(coordinator.join(coordinator.generation()), Ticket::Lead(_)));
    }

    #[tokio::test]
    async fn dropped_lease_releases_waiters() {
        let coordinator = RefreshCoordinator::new();
        let lease = lead(&coordinator);
        let queued = subscribe(&coordinator);

        drop(lease);

        assert_eq!(
            queued.wait(Duration::from_secs(1)).await,
            Err(WaitError::Failed(RefreshFailure::Abandoned))
        );
        assert_eq!(coordinator.phase(), RefreshPhase::Idle);
        assert_eq!(coordinator.generation(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn timed_out_subscriber_does_not_disturb_the_cycle() {
        let coordinator = RefreshCoordinator::new();
        let lease = lead(&coordinator);
        let impatient = subscribe(&coordinator);
        let patient = subscribe(&coordinator);

        assert_eq!(
            impatient.wait(Duration::from_millis(10)).await,
            Err(WaitError::Timeout)
        );
        assert_eq!(coordinator.queued(), 1);
        assert_eq!(coordinator.phase(), RefreshPhase::Refreshing);

        assert!(lease.succeed(token("a2")));
        assert_eq!(patient.wait(Duration::from_millis(10)).await, Ok(token("a2")));
    }

    #[tokio::test]
    async fn revoke_releases_waiters_and_orphans_the_lease() {
        let coordinator = RefreshCoordinator::new();
        let stale = lead(&coordinator);
        let queued = subscribe(&coordinator);

        let failure = RefreshFailure::SessionEnded("user logged out".into());
        coordinator.revoke(failure.clone());

        assert_eq!(
            queued.wait(Duration::from_secs(1)).await,
            Err(WaitError::Failed(failure))
        );
        assert!(!stale.is_current());
        assert_eq!(coordinator.phase(), RefreshPhase::Idle);

        let next = lead(&coordinator);
        assert!(!stale.succeed(token("a2")));
        assert_eq!(coordinator.phase(), RefreshPhase::Refreshing);
        assert!(next.is_current());
    }

    #[test]
    fn revoke_while_idle_supersedes_in_flight_requests() {
        let coordinator = RefreshCoordinator::new();
        let observed = coordinator.generation();

        coordinator.revoke(RefreshFailure::SessionEnded("user logged out".into()));

        assert!(matches!(coordinator.join(observed), Ticket::Superseded));
    }
}
