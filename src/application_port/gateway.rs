use crate::domain_model::*;
use crate::domain_port::*;
use reqwest::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("unauthorized ({status}): {message}")]
    Unauthorized { status: StatusCode, message: String },
    #[error("session expired: {0}")]
    SessionExpired(String),
    #[error("refresh token timeout")]
    RefreshTimeout,
    #[error("token refresh abandoned")]
    RefreshAbandoned,
    #[error("access token is not a valid header value")]
    InvalidToken,
    #[error("session store error: {0}")]
    Store(#[from] SessionStoreError),
}

impl GatewayError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            GatewayError::Unauthorized { status, .. } => Some(*status),
            GatewayError::SessionExpired(_) => Some(StatusCode::UNAUTHORIZED),
            _ => None,
        }
    }

    /// The session is gone and the user has to sign in again.
    pub fn requires_sign_in(&self) -> bool {
        matches!(self, GatewayError::SessionExpired(_))
    }
}

/// Drop-in replacement for [`HttpTransport::send`] that handles bearer
/// tokens and session refresh on behalf of the caller.
#[async_trait::async_trait]
pub trait ApiGateway: Send + Sync {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, GatewayError>;
    /// Store the pair obtained from a successful login.
    async fn establish_session(&self, tokens: TokenPair) -> Result<(), GatewayError>;
    async fn logout(&self) -> Result<(), GatewayError>;
}
