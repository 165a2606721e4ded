//! Access-token revocation list backed by Redis.
//!
//! Logout writes the token's JWT id with a TTL matching the token's remaining
//! lifetime, so entries expire themselves once the token would be dead anyway.

use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands, Client};
use std::collections::HashSet;
use std::sync::Mutex;

#[async_trait]
pub trait TokenBlacklist: Send + Sync {
    async fn blacklist_token(
        &self,
        token_jti: &str,
        expiry_seconds: i64,
    ) -> Result<(), anyhow::Error>;
    async fn is_blacklisted(&self, token_jti: &str) -> Result<bool, anyhow::Error>;
    async fn health_check(&self) -> Result<(), anyhow::Error>;
}

#[derive(Clone)]
pub struct RedisService {
    manager: ConnectionManager,
}

fn blacklist_key(token_jti: &str) -> String {
    format!("blacklist:{}", token_jti)
}

impl RedisService {
    pub async fn new(config: &crate::config::RedisConfig) -> Result<Self, anyhow::Error> {
        tracing::info!(url = %config.url, "Connecting to Redis");

        let client = Client::open(config.url.clone())?;
        // The manager reconnects on its own after a dropped connection.
        let manager = client
            .get_connection_manager()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to connect to Redis: {}", e))?;

        tracing::info!("Redis connection established");

        Ok(Self { manager })
    }
}

#[async_trait]
impl TokenBlacklist for RedisService {
    async fn blacklist_token(
        &self,
        token_jti: &str,
        expiry_seconds: i64,
    ) -> Result<(), anyhow::Error> {
        let mut conn = self.manager.clone();
        conn.set_ex::<_, _, ()>(
            blacklist_key(token_jti),
            "revoked",
            expiry_seconds.max(1) as u64,
        )
        .await
        .map_err(|e| anyhow::anyhow!("Failed to blacklist token: {}", e))
    }

    async fn is_blacklisted(&self, token_jti: &str) -> Result<bool, anyhow::Error> {
        let mut conn = self.manager.clone();
        conn.exists(blacklist_key(token_jti))
            .await
            .map_err(|e| anyhow::anyhow!("Failed to check blacklist: {}", e))
    }

    async fn health_check(&self) -> Result<(), anyhow::Error> {
        let mut conn = self.manager.clone();
        redis::cmd("PING")
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(|e| anyhow::anyhow!("Redis health check failed: {}", e))
    }
}

/// In-memory stand-in for tests.
#[derive(Default)]
pub struct MockBlacklist {
    entries: Mutex<HashSet<String>>,
}

impl MockBlacklist {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenBlacklist for MockBlacklist {
    async fn blacklist_token(
        &self,
        token_jti: &str,
        _expiry_seconds: i64,
    ) -> Result<(), anyhow::Error> {
        self.entries
            .lock()
            .map_err(|e| anyhow::anyhow!("Mock blacklist mutex poisoned: {}", e))?
            .insert(token_jti.to_string());
        Ok(())
    }

    async fn is_blacklisted(&self, token_jti: &str) -> Result<bool, anyhow::Error> {
        let entries = self
            .entries
            .lock()
            .map_err(|e| anyhow::anyhow!("Mock blacklist mutex poisoned: {}", e))?;
        Ok(entries.contains(token_jti))
    }

    async fn health_check(&self) -> Result<(), anyhow::Error> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_remembers_blacklisted_ids() {
        let blacklist = MockBlacklist::new();
        assert!(!blacklist.is_blacklisted("jti-1").await.unwrap());

        blacklist.blacklist_token("jti-1", 60).await.unwrap();
        assert!(blacklist.is_blacklisted("jti-1").await.unwrap());
        assert!(!blacklist.is_blacklisted("jti-2").await.unwrap());
    }
}
