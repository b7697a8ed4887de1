use crate::domain_model::*;
use crate::domain_port::*;
use std::sync::{PoisonError, RwLock};

/// Process-local session, lost on exit.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    tokens: RwLock<Option<TokenPair>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tokens(tokens: TokenPair) -> Self {
        Self {
            tokens: RwLock::new(Some(tokens)),
        }
    }

    pub fn snapshot(&self) -> Option<TokenPair> {
        self.tokens
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait::async_trait]
impl SessionStore for MemorySessionStore {
    async fn access_token(&self) -> Result<Option<AccessToken>, SessionStoreError> {
        Ok(self.snapshot().map(|t| t.access_token))
    }

    async fn refresh_token(&self) -> Result<Option<RefreshToken>, SessionStoreError> {
        Ok(self.snapshot().map(|t| t.refresh_token))
    }

    async fn set_tokens(&self, tokens: &TokenPair) -> Result<(), SessionStoreError> {
        *self.tokens.write().unwrap_or_else(PoisonError::into_inner) = Some(tokens.clone());
        Ok(())
    }

    async fn clear_tokens(&self) -> Result<(), SessionStoreError> {
        *self.tokens.write().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}
