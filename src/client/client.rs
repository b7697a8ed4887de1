use crate::application_impl::*;
use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use crate::infra_http::*;
use crate::infra_memory::*;
use crate::infra_redis::*;
use crate::logger::*;
use crate::settings::{Auth, Settings};
use anyhow::anyhow;
use reqwest::header::HeaderName;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

const LOGOUT_CHANNEL_CAP: usize = 16;

pub struct ApiClient {
    pub gateway: Arc<dyn ApiGateway>,
    pub session_store: Arc<dyn SessionStore>,
    logout_signal: Arc<BroadcastLogoutSignal>,
}

impl ApiClient {
    pub async fn try_new(settings: &Settings) -> anyhow::Result<Self> {
        let transport: Arc<dyn HttpTransport> = Arc::new(ReqwestTransport::new(
            settings.api.base_url.clone(),
            Duration::from_millis(settings.api.timeout_ms),
        )?);

        let session_store: Arc<dyn SessionStore> = match settings.session.backend.as_str() {
            "memory" => Arc::new(MemorySessionStore::new()),
            "redis" => {
                let redis_client = redis::Client::open(settings.session.redis_dsn.as_str())?;
                let redis_manager = redis_client.get_connection_manager().await?;
                Arc::new(RedisSessionStore::new(
                    redis_manager,
                    settings.session.prefix.clone(),
                    settings.session.ttl_secs,
                ))
            }
            other => return Err(anyhow!("Unknown session backend: {}", other)),
        };

        let token_refresher: Arc<dyn TokenRefresher> = Arc::new(HttpTokenRefresher::new(
            transport.clone(),
            settings.auth.refresh_path.clone(),
            refresh_token_placement(&settings.auth)?,
            Duration::from_millis(settings.auth.refresh_timeout_ms),
        ));

        let logout_signal = Arc::new(BroadcastLogoutSignal::new(LOGOUT_CHANNEL_CAP));

        let gateway: Arc<dyn ApiGateway> = Arc::new(SessionGateway::new(
            transport,
            session_store.clone(),
            token_refresher,
            logout_signal.clone(),
            GatewayConfig {
                refresh_path: settings.auth.refresh_path.clone(),
                subscriber_wait: Duration::from_millis(settings.auth.subscriber_wait_ms),
                sign_in_page: settings.auth.sign_in_page.clone(),
            },
        ));

        info!(
            base_url = %settings.api.base_url,
            session_backend = %settings.session.backend,
            "api client ready"
        );

        Ok(Self {
            gateway,
            session_store,
            logout_signal,
        })
    }

    pub fn logout_events(&self) -> broadcast::Receiver<LogoutEvent> {
        self.logout_signal.subscribe()
    }
}

fn refresh_token_placement(auth: &Auth) -> anyhow::Result<RefreshTokenPlacement> {
    match auth.refresh_token_placement.as_str() {
        "header" => Ok(RefreshTokenPlacement::Header(HeaderName::from_bytes(
            auth.refresh_token_field.as_bytes(),
        )?)),
        "body" => Ok(RefreshTokenPlacement::Body(
            auth.refresh_token_field.clone(),
        )),
        other => Err(anyhow!("Unknown refresh token placement: {}", other)),
    }
}
