//! In-process stand-in for the job-board API and its refresh endpoint.

#![allow(dead_code)]

use reqwest::StatusCode;
use reqwest::header::HeaderName;
use session_gateway::application_impl::*;
use session_gateway::domain_model::*;
use session_gateway::domain_port::*;
use session_gateway::infra_memory::MemorySessionStore;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const REFRESH_PATH: &str = "/auth/refresh";

#[derive(Clone)]
pub enum RefreshBehavior {
    Issue(TokenPair),
    Reject(StatusCode),
}

pub struct FakeApi {
    valid_access: Mutex<Option<String>>,
    refresh: Mutex<RefreshBehavior>,
    refresh_delay: Duration,
    path_delays: Mutex<HashMap<String, Duration>>,
    public_paths: Mutex<Vec<String>>,
    offline_paths: Mutex<Vec<String>>,
    reject_everything: Mutex<bool>,
    refresh_calls: AtomicUsize,
    log: Mutex<Vec<ApiRequest>>,
}

impl FakeApi {
    /// No access token is accepted until the refresh endpoint issues one.
    pub fn new(refresh: RefreshBehavior, refresh_delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            valid_access: Mutex::new(None),
            refresh: Mutex::new(refresh),
            refresh_delay,
            path_delays: Mutex::new(HashMap::new()),
            public_paths: Mutex::new(Vec::new()),
            offline_paths: Mutex::new(Vec::new()),
            reject_everything: Mutex::new(false),
            refresh_calls: AtomicUsize::new(0),
            log: Mutex::new(Vec::new()),
        })
    }

    pub fn issuing(access: &str, refresh: &str, refresh_delay: Duration) -> Arc<Self> {
        Self::new(
            RefreshBehavior::Issue(TokenPair::new(access, refresh)),
            refresh_delay,
        )
    }

    pub fn accept_access(&self, token: &str) {
        *self.valid_access.lock().unwrap() = Some(token.to_string());
    }

    pub fn delay_path(&self, path: &str, delay: Duration) {
        self.path_delays
            .lock()
            .unwrap()
            .insert(path.to_string(), delay);
    }

    pub fn make_public(&self, path: &str) {
        self.public_paths.lock().unwrap().push(path.to_string());
    }

    pub fn take_offline(&self, path: &str) {
        self.offline_paths.lock().unwrap().push(path.to_string());
    }

    pub fn reject_everything(&self) {
        *self.reject_everything.lock().unwrap() = true;
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn requests_to(&self, path: &str) -> Vec<ApiRequest> {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.path() == path)
            .cloned()
            .collect()
    }

    async fn answer_refresh(&self) -> ApiResponse {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.refresh_delay).await;

        let behavior = self.refresh.lock().unwrap().clone();
        match behavior {
            RefreshBehavior::Issue(tokens) => {
                self.accept_access(tokens.access_token.as_str());
                let body = serde_json::to_vec(&tokens).unwrap();
                ApiResponse::new(StatusCode::OK).with_body(body)
            }
            RefreshBehavior::Reject(status) => ApiResponse::new(status),
        }
    }
}

#[async_trait::async_trait]
impl HttpTransport for FakeApi {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        let path = request.path().to_string();
        self.log.lock().unwrap().push(request.clone());

        if self.offline_paths.lock().unwrap().contains(&path) {
            return Err(TransportError::Connect("connection refused".into()));
        }
        if path == REFRESH_PATH {
            return Ok(self.answer_refresh().await);
        }

        let delay = self.path_delays.lock().unwrap().get(&path).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.public_paths.lock().unwrap().contains(&path) {
            return Ok(ApiResponse::new(StatusCode::OK).with_body(path));
        }

        let valid = self.valid_access.lock().unwrap().clone();
        let authorized = !*self.reject_everything.lock().unwrap()
            && valid.is_some()
            && request.bearer_token() == valid.as_deref();
        if authorized {
            Ok(ApiResponse::new(StatusCode::OK).with_body(path))
        } else {
            Ok(ApiResponse::new(StatusCode::UNAUTHORIZED).with_body("token expired"))
        }
    }
}

pub struct Harness {
    pub api: Arc<FakeApi>,
    pub store: Arc<MemorySessionStore>,
    pub gateway: SessionGateway,
    pub logouts: Arc<Mutex<Vec<LogoutEvent>>>,
}

impl Harness {
    pub fn new(api: Arc<FakeApi>, store: MemorySessionStore, subscriber_wait: Duration) -> Self {
        let store = Arc::new(store);
        let logouts = Arc::new(Mutex::new(Vec::new()));

        let recorded = logouts.clone();
        let logout_signal = Arc::new(move |event: LogoutEvent| {
            recorded.lock().unwrap().push(event);
        });

        let refresher = Arc::new(HttpTokenRefresher::new(
            api.clone(),
            REFRESH_PATH,
            RefreshTokenPlacement::Header(HeaderName::from_static("refreshtoken")),
            Duration::from_secs(10),
        ));

        let gateway = SessionGateway::new(
            api.clone(),
            store.clone(),
            refresher,
            logout_signal,
            GatewayConfig {
                refresh_path: REFRESH_PATH.to_string(),
                subscriber_wait,
                sign_in_page: "/signin".to_string(),
            },
        );

        Self {
            api,
            store,
            gateway,
            logouts,
        }
    }

    /// Session holding an access token the API no longer accepts.
    pub fn expired(api: Arc<FakeApi>, subscriber_wait: Duration) -> Self {
        Self::new(
            api,
            MemorySessionStore::with_tokens(TokenPair::new("a1", "r1")),
            subscriber_wait,
        )
    }

    pub fn logout_count(&self) -> usize {
        self.logouts.lock().unwrap().len()
    }

    pub fn refresh_phase(&self) -> RefreshPhase {
        self.gateway.refresh_phase()
    }

    pub fn requests_per_path(&self, path: &str) -> usize {
        self.api.requests_to(path).len()
    }
}
