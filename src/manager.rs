//! Crate front door: wires config and stores into issuer and validator.

use crate::claims::TokenClaims;
use crate::config::Config;
use crate::error::TokenError;
use crate::fingerprint::ClientFingerprint;
use crate::identity::{AuthenticatedUser, IdentityStore};
use crate::issuer::{TokenIssuer, TokenPair};
use crate::store::{NonceCache, NonceRepository, NonceStore, RedisNonceCache};
use crate::validator::TokenValidator;
use std::collections::BTreeMap;
use std::sync::Arc;

/// The four-operation surface the application consumes:
/// `issue_pair`, `validate`, `refresh`, `resolve_user`.
pub struct SessionManager {
    issuer: Arc<TokenIssuer>,
    validator: TokenValidator,
}

impl SessionManager {
    /// Wire the subsystem from a config and its external collaborators.
    ///
    /// `cache` is honored only when `config.cache_enabled` is set.
    #[must_use]
    pub fn new(
        config: Config,
        repository: Arc<dyn NonceRepository>,
        cache: Option<Arc<dyn NonceCache>>,
        identity: Arc<dyn IdentityStore>,
    ) -> Self {
        let config = Arc::new(config);
        let store = Arc::new(NonceStore::new(repository, cache, &config));
        let issuer = Arc::new(TokenIssuer::new(&config, store.clone(), identity.clone()));
        let validator = TokenValidator::new(config, store, identity, issuer.clone());

        Self { issuer, validator }
    }

    /// Wire the subsystem with a Redis cache tier at `config.redis_url`.
    pub async fn with_redis_cache(
        config: Config,
        repository: Arc<dyn NonceRepository>,
        identity: Arc<dyn IdentityStore>,
    ) -> Result<Self, TokenError> {
        let cache: Option<Arc<dyn NonceCache>> = if config.cache_enabled {
            Some(Arc::new(RedisNonceCache::new(&config.redis_url).await?))
        } else {
            None
        };
        Ok(Self::new(config, repository, cache, identity))
    }

    /// Issue the access/refresh pair for a fresh login.
    pub async fn issue_pair(
        &self,
        user_id: i64,
        extra_claims: &BTreeMap<String, String>,
        fingerprint: &ClientFingerprint,
    ) -> Result<TokenPair, TokenError> {
        self.issuer
            .issue_pair(user_id, extra_claims, fingerprint)
            .await
    }

    /// Accept or reject an inbound token.
    pub async fn validate(
        &self,
        raw_token: &str,
        fingerprint: &ClientFingerprint,
    ) -> Result<TokenClaims, TokenError> {
        self.validator.validate(raw_token, fingerprint).await
    }

    /// Exchange a refresh token for a fresh access token.
    pub async fn refresh(
        &self,
        raw_refresh_token: &str,
        fingerprint: &ClientFingerprint,
    ) -> Result<String, TokenError> {
        self.validator
            .refresh(raw_refresh_token, fingerprint)
            .await
    }

    /// Materialize the authenticated user for validated claims.
    pub async fn resolve_user(
        &self,
        claims: &TokenClaims,
    ) -> Result<AuthenticatedUser, TokenError> {
        self.validator.resolve_user(claims).await
    }
}
