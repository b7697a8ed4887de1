use crate::domain_model::*;
use crate::domain_port::*;
use reqwest::header::{HeaderName, HeaderValue};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshTokenPlacement {
    /// `RefreshToken: <token>` request header.
    Header(HeaderName),
    /// `{"<field>": "<token>"}` JSON body.
    Body(String),
}

/// Talks to the refresh endpoint directly through the transport, bypassing
/// the gateway so that a rejected refresh can never recurse.
pub struct HttpTokenRefresher {
    transport: Arc<dyn HttpTransport>,
    refresh_path: String,
    placement: RefreshTokenPlacement,
    timeout: Duration,
}

impl HttpTokenRefresher {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        refresh_path: impl Into<String>,
        placement: RefreshTokenPlacement,
        timeout: Duration,
    ) -> Self {
        Self {
            transport,
            refresh_path: refresh_path.into(),
            placement,
            timeout,
        }
    }

    fn build_request(&self, refresh_token: &RefreshToken) -> Result<ApiRequest, RefreshError> {
        let request = ApiRequest::post(self.refresh_path.clone());
        match &self.placement {
            RefreshTokenPlacement::Header(name) => {
                let mut value = HeaderValue::from_str(refresh_token.as_str()).map_err(|e| {
                    TransportError::InvalidRequest(format!("refresh token header: {}", e))
                })?;
                value.set_sensitive(true);
                Ok(request.header(name.clone(), value))
            }
            RefreshTokenPlacement::Body(field) => {
                let mut body = serde_json::Map::new();
                body.insert(field.clone(), refresh_token.as_str().into());
                request
                    .json(&body)
                    .map_err(|e| TransportError::InvalidRequest(e.to_string()).into())
            }
        }
    }
}

#[async_trait::async_trait]
impl TokenRefresher for HttpTokenRefresher {
    async fn refresh(&self, refresh_token: &RefreshToken) -> Result<TokenPair, RefreshError> {
        let request = self.build_request(refresh_token)?;
        tracing::debug!(refresh_token = %refresh_token.fingerprint(), "requesting new token pair");

        let response = tokio::time::timeout(self.timeout, self.transport.send(request))
            .await
            .map_err(|_| RefreshError::Timeout)??;

        if !response.is_success() {
            tracing::warn!(status = %response.status, "refresh endpoint rejected refresh token");
            return Err(RefreshError::Rejected {
                status: response.status,
            });
        }

        let tokens: TokenPair = response
            .json()
            .map_err(|e| RefreshError::InvalidResponse(e.to_string()))?;
        if tokens.access_token.as_str().is_empty() || tokens.refresh_token.as_str().is_empty() {
            return Err(RefreshError::InvalidResponse("empty token in pair".into()));
        }

        tracing::debug!(access_token = %tokens.access_token.fingerprint(), "received new token pair");
        Ok(tokens)
    }
}
