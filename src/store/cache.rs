//! Cache tier in front of the durable nonce store.
//!
//! Purely a performance optimization: the durable record is the source of
//! truth and every miss or failure degrades to the repository.

use crate::error::TokenError;
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

#[async_trait]
pub trait NonceCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, TokenError>;
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), TokenError>;
    async fn delete(&self, key: &str) -> Result<(), TokenError>;
}

/// Redis-backed cache tier.
pub struct RedisNonceCache {
    conn: Arc<RwLock<ConnectionManager>>,
}

impl RedisNonceCache {
    pub async fn new(redis_url: &str) -> Result<Self, TokenError> {
        let client = redis::Client::open(redis_url).map_err(|e| TokenError::cache(e.to_string()))?;

        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| TokenError::cache(e.to_string()))?;

        Ok(RedisNonceCache {
            conn: Arc::new(RwLock::new(conn)),
        })
    }
}

#[async_trait]
impl NonceCache for RedisNonceCache {
    async fn get(&self, key: &str) -> Result<Option<String>, TokenError> {
        let mut conn = self.conn.write().await;
        let value: Option<String> = conn
            .get(key)
            .await
            .map_err(|e| TokenError::cache(e.to_string()))?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), TokenError> {
        let mut conn = self.conn.write().await;
        conn.set_ex::<_, _, ()>(key, value, ttl.as_secs())
            .await
            .map_err(|e| TokenError::cache(e.to_string()))?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), TokenError> {
        let mut conn = self.conn.write().await;
        conn.del::<_, ()>(key)
            .await
            .map_err(|e| TokenError::cache(e.to_string()))?;
        Ok(())
    }
}

struct MemoryCacheEntry {
    value: String,
    expires_at: Instant,
}

/// Instant-stamped in-process cache for tests and single-node deployments.
pub struct MemoryNonceCache {
    entries: RwLock<HashMap<String, MemoryCacheEntry>>,
}

impl MemoryNonceCache {
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryNonceCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NonceCache for MemoryNonceCache {
    async fn get(&self, key: &str) -> Result<Option<String>, TokenError> {
        let entries = self.entries.read().await;
        Ok(entries
            .get(key)
            .filter(|entry| entry.expires_at > Instant::now())
            .map(|entry| entry.value.clone()))
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), TokenError> {
        let mut entries = self.entries.write().await;
        entries.insert(
            key.to_string(),
            MemoryCacheEntry {
                value: value.to_string(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), TokenError> {
        let mut entries = self.entries.write().await;
        entries.remove(key);
        Ok(())
    }
}
