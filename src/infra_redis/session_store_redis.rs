use crate::domain_model::*;
use crate::domain_port::*;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, FromRedisValue, RedisError, RedisResult, Value};

/// Keeps the pair under one key so that a read always sees a whole pair.
pub struct RedisSessionStore {
    conn: ConnectionManager,
    prefix: String,
    ttl_secs: u64,
}

impl RedisSessionStore {
    pub fn new(conn: ConnectionManager, prefix: impl Into<String>, ttl_secs: u64) -> Self {
        RedisSessionStore {
            conn,
            prefix: prefix.into(),
            ttl_secs,
        }
    }

    fn key(&self) -> String {
        format!("{}:tokens", self.prefix)
    }

    async fn load(&self) -> Result<Option<TokenPair>, SessionStoreError> {
        let mut conn = self.conn.clone();
        let tokens: Option<TokenPair> = conn.get(self.key()).await.map_err(|e| {
            if e.kind() == redis::ErrorKind::TypeError {
                SessionStoreError::Corrupt(e.to_string())
            } else {
                SessionStoreError::Store(e.to_string())
            }
        })?;
        Ok(tokens)
    }
}

impl FromRedisValue for TokenPair {
    fn from_redis_value(v: &Value) -> RedisResult<Self> {
        let bytes: Vec<u8> = redis::from_redis_value(v)?;
        let tokens = serde_json::from_slice::<TokenPair>(&bytes).map_err(|e| {
            RedisError::from((
                redis::ErrorKind::TypeError,
                "invalid session record",
                e.to_string(),
            ))
        })?;
        Ok(tokens)
    }
}

#[async_trait::async_trait]
impl SessionStore for RedisSessionStore {
    async fn access_token(&self) -> Result<Option<AccessToken>, SessionStoreError> {
        Ok(self.load().await?.map(|t| t.access_token))
    }

    async fn refresh_token(&self) -> Result<Option<RefreshToken>, SessionStoreError> {
        Ok(self.load().await?.map(|t| t.refresh_token))
    }

    async fn set_tokens(&self, tokens: &TokenPair) -> Result<(), SessionStoreError> {
        let record =
            serde_json::to_vec(tokens).map_err(|e| SessionStoreError::Corrupt(e.to_string()))?;
        let mut conn = self.conn.clone();
        let _: () = conn
            .set_ex(self.key(), record, self.ttl_secs)
            .await
            .map_err(|e| SessionStoreError::Store(e.to_string()))?;
        Ok(())
    }

    async fn clear_tokens(&self) -> Result<(), SessionStoreError> {
        let mut conn = self.conn.clone();
        let _: () = conn
            .del(self.key())
            .await
            .map_err(|e| SessionStoreError::Store(e.to_string()))?;
        Ok(())
    }
}
