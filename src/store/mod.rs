//! Nonce store: the authoritative per-(user, kind) validity marker.
//!
//! A durable repository holds the records; an optional cache tier fronts it
//! for the hot validate path. Rotation always writes both tiers. The
//! get-or-create and rotate paths are read-then-write sequences without a
//! cross-request lock; concurrent creators converge through the backing
//! store's uniqueness constraint on `nonce` plus a bounded retry.

pub mod cache;
pub mod record;
pub mod repository;

pub use cache::{MemoryNonceCache, NonceCache, RedisNonceCache};
pub use record::AuthNonceRecord;
pub use repository::{MemoryNonceRepository, NonceRepository, RepositoryError};

use crate::claims::TokenKind;
use crate::config::Config;
use crate::error::TokenError;
use crate::metrics::{CACHE_OPERATIONS, NONCE_ROTATIONS};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub struct NonceStore {
    repository: Arc<dyn NonceRepository>,
    cache: Option<Arc<dyn NonceCache>>,
    cache_ttl: Duration,
    create_retries: u32,
}

impl NonceStore {
    #[must_use]
    pub fn new(
        repository: Arc<dyn NonceRepository>,
        cache: Option<Arc<dyn NonceCache>>,
        config: &Config,
    ) -> Self {
        Self {
            repository,
            cache: if config.cache_enabled { cache } else { None },
            cache_ttl: config.nonce_cache_ttl,
            create_retries: config.nonce_create_retries,
        }
    }

    fn cache_key(user_id: i64, kind: TokenKind) -> String {
        format!("auth_nonce:{}:{}", user_id, kind.as_str())
    }

    /// Current authoritative nonce for `(user_id, kind)`, creating the
    /// record lazily on first use. Cache hit wins when the tier is enabled.
    pub async fn get_or_create(&self, user_id: i64, kind: TokenKind) -> Result<Uuid, TokenError> {
        if let Some(cache) = &self.cache {
            let key = Self::cache_key(user_id, kind);
            match cache.get(&key).await {
                Ok(Some(value)) => {
                    if let Ok(nonce) = Uuid::parse_str(&value) {
                        CACHE_OPERATIONS.with_label_values(&["get", "hit"]).inc();
                        return Ok(nonce);
                    }
                    // Unparseable entry: treat as a miss and repopulate
                    CACHE_OPERATIONS.with_label_values(&["get", "miss"]).inc();
                }
                Ok(None) => {
                    CACHE_OPERATIONS.with_label_values(&["get", "miss"]).inc();
                }
                Err(e) => {
                    CACHE_OPERATIONS.with_label_values(&["get", "error"]).inc();
                    warn!(user_id, kind = %kind, error = %e, "Nonce cache read failed, falling back to store");
                }
            }
        }

        let record = self.load_or_create(user_id, kind).await?;
        self.fill_cache(user_id, kind, record.nonce).await;
        Ok(record.nonce)
    }

    /// Full record fetch for the device-limit path, which needs the counter
    /// in addition to the nonce. Bypasses the cache.
    pub async fn get_record(
        &self,
        user_id: i64,
        kind: TokenKind,
    ) -> Result<AuthNonceRecord, TokenError> {
        self.load_or_create(user_id, kind).await
    }

    /// Replace the nonce with a fresh UUID, resetting the device counter and
    /// refreshing the cache. Every previously issued token of this kind for
    /// this user becomes invalid.
    pub async fn rotate(&self, user_id: i64, kind: TokenKind) -> Result<Uuid, TokenError> {
        let nonce = self.rotate_record(user_id, kind).await?;
        self.fill_cache(user_id, kind, nonce).await;
        Ok(nonce)
    }

    /// Rotate without reissuing: the logout-everywhere lever. The cache
    /// entry is dropped rather than refreshed since no outstanding token
    /// carries the new nonce.
    pub async fn invalidate(&self, user_id: i64, kind: TokenKind) -> Result<(), TokenError> {
        self.rotate_record(user_id, kind).await?;

        if let Some(cache) = &self.cache {
            let key = Self::cache_key(user_id, kind);
            if let Err(e) = cache.delete(&key).await {
                CACHE_OPERATIONS
                    .with_label_values(&["delete", "error"])
                    .inc();
                warn!(user_id, kind = %kind, error = %e, "Nonce cache delete failed");
            }
        }

        info!(user_id, kind = %kind, "Invalidated all outstanding tokens");
        Ok(())
    }

    /// Persist a mutated record (device counter updates). The nonce is
    /// unchanged, so the cache needs no refresh.
    pub async fn persist(&self, record: &AuthNonceRecord) -> Result<(), TokenError> {
        self.repository
            .update(record)
            .await
            .map_err(|e| TokenError::storage(e.to_string()))
    }

    async fn load_or_create(
        &self,
        user_id: i64,
        kind: TokenKind,
    ) -> Result<AuthNonceRecord, TokenError> {
        if let Some(existing) = self
            .repository
            .find(user_id, kind)
            .await
            .map_err(|e| TokenError::storage(e.to_string()))?
        {
            return Ok(existing);
        }

        for attempt in 0..self.create_retries {
            let record = AuthNonceRecord::new(user_id, kind, Uuid::new_v4());
            match self.repository.insert(record.clone()).await {
                Ok(()) => {
                    debug!(user_id, kind = %kind, "Created nonce record");
                    return Ok(record);
                }
                Err(RepositoryError::DuplicateNonce) => {
                    warn!(user_id, kind = %kind, attempt, "Nonce collision on create, retrying");
                }
                Err(e) => return Err(TokenError::storage(e.to_string())),
            }
        }

        Err(TokenError::internal(format!(
            "Nonce generation exhausted {} retries",
            self.create_retries
        )))
    }

    async fn rotate_record(&self, user_id: i64, kind: TokenKind) -> Result<Uuid, TokenError> {
        let record = self.load_or_create(user_id, kind).await?;

        for attempt in 0..self.create_retries {
            let mut rotated = record.clone();
            rotated.rotate(Uuid::new_v4());
            match self.repository.update(&rotated).await {
                Ok(()) => {
                    NONCE_ROTATIONS
                        .with_label_values(&[kind.as_str(), "rotate"])
                        .inc();
                    info!(user_id, kind = %kind, "Rotated nonce");
                    return Ok(rotated.nonce);
                }
                Err(RepositoryError::DuplicateNonce) => {
                    warn!(user_id, kind = %kind, attempt, "Nonce collision on rotate, retrying");
                }
                Err(e) => return Err(TokenError::storage(e.to_string())),
            }
        }

        Err(TokenError::internal(format!(
            "Nonce rotation exhausted {} retries",
            self.create_retries
        )))
    }

    async fn fill_cache(&self, user_id: i64, kind: TokenKind, nonce: Uuid) {
        if let Some(cache) = &self.cache {
            let key = Self::cache_key(user_id, kind);
            match cache.set(&key, &nonce.to_string(), self.cache_ttl).await {
                Ok(()) => CACHE_OPERATIONS.with_label_values(&["set", "ok"]).inc(),
                Err(e) => {
                    CACHE_OPERATIONS.with_label_values(&["set", "error"]).inc();
                    warn!(user_id, kind = %kind, error = %e, "Nonce cache write failed");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_cache() -> (NonceStore, Arc<MemoryNonceCache>) {
        let cache = Arc::new(MemoryNonceCache::new());
        let store = NonceStore::new(
            Arc::new(MemoryNonceRepository::new()),
            Some(cache.clone()),
            &Config::default(),
        );
        (store, cache)
    }

    fn store_without_cache() -> NonceStore {
        NonceStore::new(
            Arc::new(MemoryNonceRepository::new()),
            None,
            &Config::default().with_cache_enabled(false),
        )
    }

    #[tokio::test]
    async fn test_get_or_create_is_stable() {
        let store = store_without_cache();

        let n1 = store.get_or_create(42, TokenKind::Access).await.unwrap();
        let n2 = store.get_or_create(42, TokenKind::Access).await.unwrap();
        assert_eq!(n1, n2);
    }

    #[tokio::test]
    async fn test_kinds_are_independent() {
        let store = store_without_cache();

        let access = store.get_or_create(42, TokenKind::Access).await.unwrap();
        let refresh = store.get_or_create(42, TokenKind::Refresh).await.unwrap();
        assert_ne!(access, refresh);
    }

    #[tokio::test]
    async fn test_rotation_changes_nonce() {
        let store = store_without_cache();

        let before = store.get_or_create(42, TokenKind::Access).await.unwrap();
        let rotated = store.rotate(42, TokenKind::Access).await.unwrap();
        let after = store.get_or_create(42, TokenKind::Access).await.unwrap();

        assert_ne!(before, rotated);
        assert_eq!(rotated, after);
    }

    #[tokio::test]
    async fn test_cache_populated_on_create() {
        let (store, cache) = store_with_cache();

        let nonce = store.get_or_create(42, TokenKind::Access).await.unwrap();
        let cached = cache.get("auth_nonce:42:access").await.unwrap();
        assert_eq!(cached, Some(nonce.to_string()));
    }

    #[tokio::test]
    async fn test_rotation_refreshes_cache() {
        let (store, cache) = store_with_cache();

        store.get_or_create(42, TokenKind::Access).await.unwrap();
        let rotated = store.rotate(42, TokenKind::Access).await.unwrap();

        let cached = cache.get("auth_nonce:42:access").await.unwrap();
        assert_eq!(cached, Some(rotated.to_string()));
    }

    #[tokio::test]
    async fn test_stale_cache_entry_wins_until_rotation() {
        // The cache is authoritative on the read path when enabled: a hit
        // short-circuits the repository entirely.
        let (store, cache) = store_with_cache();

        let planted = Uuid::new_v4();
        cache
            .set(
                "auth_nonce:42:access",
                &planted.to_string(),
                Duration::from_secs(60),
            )
            .await
            .unwrap();

        let got = store.get_or_create(42, TokenKind::Access).await.unwrap();
        assert_eq!(got, planted);
    }

    #[tokio::test]
    async fn test_unparseable_cache_entry_treated_as_miss() {
        let (store, cache) = store_with_cache();

        cache
            .set("auth_nonce:42:access", "garbage", Duration::from_secs(60))
            .await
            .unwrap();

        let nonce = store.get_or_create(42, TokenKind::Access).await.unwrap();

        // Entry repopulated with the durable value
        let cached = cache.get("auth_nonce:42:access").await.unwrap();
        assert_eq!(cached, Some(nonce.to_string()));
    }

    #[tokio::test]
    async fn test_invalidate_rotates_and_drops_cache() {
        let (store, cache) = store_with_cache();

        let before = store.get_or_create(42, TokenKind::Refresh).await.unwrap();
        store.invalidate(42, TokenKind::Refresh).await.unwrap();

        assert!(cache.get("auth_nonce:42:refresh").await.unwrap().is_none());

        let after = store.get_or_create(42, TokenKind::Refresh).await.unwrap();
        assert_ne!(before, after);
    }

    #[tokio::test]
    async fn test_get_record_exposes_counter() {
        let store = store_without_cache();

        let record = store.get_record(42, TokenKind::Access).await.unwrap();
        assert_eq!(record.device_login_count, 0);

        let mut record = record;
        record.record_login();
        store.persist(&record).await.unwrap();

        let reloaded = store.get_record(42, TokenKind::Access).await.unwrap();
        assert_eq!(reloaded.device_login_count, 1);
    }
}
