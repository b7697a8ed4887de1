use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum LogoutReason {
    MissingRefreshToken,
    RefreshFailed(String),
    RefreshEndpointUnauthorized,
    UserInitiated,
}

impl fmt::Display for LogoutReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogoutReason::MissingRefreshToken => write!(f, "no refresh token"),
            LogoutReason::RefreshFailed(e) => write!(f, "token refresh failed: {}", e),
            LogoutReason::RefreshEndpointUnauthorized => {
                write!(f, "refresh endpoint rejected the session")
            }
            LogoutReason::UserInitiated => write!(f, "user logged out"),
        }
    }
}

/// Emitted once per torn-down session. Navigation to `redirect_to` is up to
/// whoever listens.
#[derive(Debug, Clone, Serialize)]
pub struct LogoutEvent {
    pub reason: LogoutReason,
    pub redirect_to: String,
    pub at: DateTime<Utc>,
}

impl LogoutEvent {
    pub fn new(reason: LogoutReason, redirect_to: impl Into<String>) -> Self {
        Self {
            reason,
            redirect_to: redirect_to.into(),
            at: Utc::now(),
        }
    }
}
