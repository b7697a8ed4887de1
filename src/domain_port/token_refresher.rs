use crate::domain_model::*;
use crate::domain_port::TransportError;
use reqwest::StatusCode;

#[async_trait::async_trait]
pub trait TokenRefresher: Send + Sync {
    /// Exchange a refresh token for a new pair.
    async fn refresh(&self, refresh_token: &RefreshToken) -> Result<TokenPair, RefreshError>;
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum RefreshError {
    #[error("refresh endpoint answered {status}")]
    Rejected { status: StatusCode },
    #[error("refresh call timed out")]
    Timeout,
    #[error("malformed refresh response: {0}")]
    InvalidResponse(String),
    #[error(transparent)]
    Transport(#[from] TransportError),
}
