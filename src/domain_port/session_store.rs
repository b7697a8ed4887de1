use crate::domain_model::*;

#[async_trait::async_trait]
pub trait SessionStore: Send + Sync {
    async fn access_token(&self) -> Result<Option<AccessToken>, SessionStoreError>;
    async fn refresh_token(&self) -> Result<Option<RefreshToken>, SessionStoreError>;
    /// Replace both tokens in one step. Readers never see a mixed pair.
    async fn set_tokens(&self, tokens: &TokenPair) -> Result<(), SessionStoreError>;
    async fn clear_tokens(&self) -> Result<(), SessionStoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum SessionStoreError {
    #[error("infra error: {0}")]
    Store(String),
    #[error("corrupt session record: {0}")]
    Corrupt(String),
}
