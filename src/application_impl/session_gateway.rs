use crate::application_impl::*;
use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use nanoid::nanoid;
use std::sync::Arc;
use std::time::Duration;
use tracing::{Instrument, debug, error, info, warn};

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Path of the refresh endpoint; a 401 from it ends the session.
    pub refresh_path: String,
    /// How long a queued request waits for someone else's refresh.
    pub subscriber_wait: Duration,
    pub sign_in_page: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            refresh_path: "/auth/refresh".to_string(),
            subscriber_wait: Duration::from_secs(10),
            sign_in_page: "/signin".to_string(),
        }
    }
}

impl From<RefreshFailure> for GatewayError {
    fn from(failure: RefreshFailure) -> Self {
        match failure {
            RefreshFailure::SessionEnded(reason) => GatewayError::SessionExpired(reason),
            RefreshFailure::Abandoned => GatewayError::RefreshAbandoned,
        }
    }
}

fn ended_during_refresh() -> GatewayError {
    GatewayError::SessionExpired("session ended during refresh".to_string())
}

pub struct SessionGateway {
    transport: Arc<dyn HttpTransport>,
    session_store: Arc<dyn SessionStore>,
    token_refresher: Arc<dyn TokenRefresher>,
    logout_signal: Arc<dyn LogoutSignal>,
    coordinator: RefreshCoordinator,
    config: GatewayConfig,
}

impl SessionGateway {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        session_store: Arc<dyn SessionStore>,
        token_refresher: Arc<dyn TokenRefresher>,
        logout_signal: Arc<dyn LogoutSignal>,
        config: GatewayConfig,
    ) -> Self {
        Self {
            transport,
            session_store,
            token_refresher,
            logout_signal,
            coordinator: RefreshCoordinator::new(),
            config,
        }
    }

    pub fn refresh_phase(&self) -> RefreshPhase {
        self.coordinator.phase()
    }

    fn is_refresh_call(&self, request: &ApiRequest) -> bool {
        request.path() == self.config.refresh_path
    }

    async fn dispatch(
        &self,
        mut request: ApiRequest,
        access_token: Option<&AccessToken>,
    ) -> Result<ApiResponse, GatewayError> {
        if let Some(token) = access_token {
            request
                .set_bearer(token)
                .map_err(|_| GatewayError::InvalidToken)?;
        }
        Ok(self.transport.send(request).await?)
    }

    async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, GatewayError> {
        // Read before the token so a cycle settling in between is detected.
        let generation = self.coordinator.generation();
        let access_token = self.session_store.access_token().await?;
        if access_token.is_none() {
            debug!("no access token, sending without credentials");
        }

        let response = self
            .dispatch(request.clone(), access_token.as_ref())
            .await?;
        if !response.is_unauthorized() {
            return Ok(response);
        }

        if self.is_refresh_call(&request) {
            warn!("refresh endpoint answered 401");
            self.end_session(LogoutReason::RefreshEndpointUnauthorized)
                .await?;
            return Err(GatewayError::SessionExpired(
                LogoutReason::RefreshEndpointUnauthorized.to_string(),
            ));
        }

        match self.coordinator.join(generation) {
            Ticket::Lead(lease) => {
                let token = self.run_refresh(lease).await?;
                self.replay(request, &token).await
            }
            Ticket::Wait(subscription) => {
                let id = subscription.id();
                match subscription.wait(self.config.subscriber_wait).await {
                    Ok(token) => self.replay(request, &token).await,
                    Err(WaitError::Timeout) => {
                        warn!(subscriber = id, "gave up waiting for token refresh");
                        Err(GatewayError::RefreshTimeout)
                    }
                    Err(WaitError::Failed(failure)) => Err(failure.into()),
                }
            }
            Ticket::Superseded => match self.session_store.access_token().await? {
                Some(token) => self.replay(request, &token).await,
                None => Err(GatewayError::SessionExpired(
                    "session ended while the request was in flight".to_string(),
                )),
            },
            Ticket::Rejected(failure) => Err(failure.into()),
        }
    }

    async fn run_refresh(&self, lease: RefreshLease<'_>) -> Result<AccessToken, GatewayError> {
        // Store errors drop the lease: waiters are released, session untouched.
        let Some(refresh_token) = self.session_store.refresh_token().await? else {
            return self
                .abort_session(lease, LogoutReason::MissingRefreshToken)
                .await;
        };

        match self.token_refresher.refresh(&refresh_token).await {
            Ok(tokens) => {
                if !lease.is_current() {
                    debug!("session ended during refresh, discarding new pair");
                    return Err(ended_during_refresh());
                }
                self.session_store.set_tokens(&tokens).await?;
                let queued = self.coordinator.queued();
                if !lease.succeed(tokens.access_token.clone()) {
                    // Logout landed while the pair was being written.
                    self.session_store.clear_tokens().await?;
                    return Err(ended_during_refresh());
                }
                info!(
                    access_token = %tokens.access_token.fingerprint(),
                    queued,
                    "session refreshed"
                );
                Ok(tokens.access_token)
            }
            Err(e) => {
                self.abort_session(lease, LogoutReason::RefreshFailed(e.to_string()))
                    .await
            }
        }
    }

    async fn abort_session(
        &self,
        lease: RefreshLease<'_>,
        reason: LogoutReason,
    ) -> Result<AccessToken, GatewayError> {
        let failure = RefreshFailure::SessionEnded(reason.to_string());
        lease.begin_teardown(failure.clone());

        if !lease.is_current() {
            debug!(%reason, "refresh failed after the session was already ended");
            return Err(failure.into());
        }
        if let Err(e) = self.session_store.clear_tokens().await {
            error!("failed to clear session after refresh failure: {}", e);
        }
        if lease.fail(failure.clone()) {
            warn!(%reason, "session ended");
            self.logout_signal
                .signal(LogoutEvent::new(reason, &self.config.sign_in_page));
        } else {
            debug!(%reason, "refresh failed after the session was already ended");
        }
        Err(failure.into())
    }

    async fn end_session(&self, reason: LogoutReason) -> Result<(), GatewayError> {
        self.coordinator
            .revoke(RefreshFailure::SessionEnded(reason.to_string()));
        let cleared = self.session_store.clear_tokens().await;
        info!(%reason, "session ended");
        self.logout_signal
            .signal(LogoutEvent::new(reason, &self.config.sign_in_page));
        Ok(cleared?)
    }

    async fn replay(
        &self,
        request: ApiRequest,
        access_token: &AccessToken,
    ) -> Result<ApiResponse, GatewayError> {
        debug!(access_token = %access_token.fingerprint(), "replaying with refreshed token");
        let response = self.dispatch(request, Some(access_token)).await?;
        if response.is_unauthorized() {
            warn!("rejected again after refresh");
            return Err(GatewayError::Unauthorized {
                status: response.status,
                message: response.text(),
            });
        }
        Ok(response)
    }
}

#[async_trait::async_trait]
impl ApiGateway for SessionGateway {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, GatewayError> {
        let request_id = nanoid!(8);
        let span = tracing::debug_span!(
            "api",
            %request_id,
            method = %request.method,
            path = %request.path(),
        );
        self.execute(request).instrument(span).await
    }

    async fn establish_session(&self, tokens: TokenPair) -> Result<(), GatewayError> {
        self.session_store.set_tokens(&tokens).await?;
        info!(access_token = %tokens.access_token.fingerprint(), "session established");
        Ok(())
    }

    async fn logout(&self) -> Result<(), GatewayError> {
        self.end_session(LogoutReason::UserInitiated).await
    }
}
