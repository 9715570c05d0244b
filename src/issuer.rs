//! Token issuance: nonce resolution, claim merging, sealing.

use crate::claims::TokenKind;
use crate::codec::TokenCodec;
use crate::config::Config;
use crate::crypto::TokenCipher;
use crate::error::TokenError;
use crate::fingerprint::ClientFingerprint;
use crate::identity::IdentityStore;
use crate::limit::DeviceLimiter;
use crate::metrics::TOKENS_ISSUED;
use crate::store::NonceStore;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

/// The access/refresh pair handed back at login.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

pub struct TokenIssuer {
    limiter: DeviceLimiter,
    codec: TokenCodec,
    cipher: TokenCipher,
    identity: Arc<dyn IdentityStore>,
}

impl TokenIssuer {
    #[must_use]
    pub fn new(config: &Config, store: Arc<NonceStore>, identity: Arc<dyn IdentityStore>) -> Self {
        Self {
            limiter: DeviceLimiter::new(store, config.device_limit),
            codec: TokenCodec::from_config(config),
            cipher: TokenCipher::new(config.encryption_key),
            identity,
        }
    }

    /// Mint one opaque token of the given kind.
    pub async fn issue(
        &self,
        kind: TokenKind,
        user_id: i64,
        extra_claims: &BTreeMap<String, String>,
        fingerprint: &ClientFingerprint,
    ) -> Result<String, TokenError> {
        let nonce = self.limiter.nonce_for_issuance(user_id, kind).await?;
        let payload = self
            .codec
            .encode(kind, user_id, nonce, fingerprint, extra_claims)?;
        let token = self.cipher.seal(&payload)?;

        TOKENS_ISSUED.with_label_values(&[kind.as_str()]).inc();
        info!(user_id, kind = %kind, "Issued token");

        Ok(token)
    }

    /// Mint the access/refresh pair for a login and stamp the identity
    /// record's `last_login` — the subsystem's only write outside its own
    /// nonce records.
    pub async fn issue_pair(
        &self,
        user_id: i64,
        extra_claims: &BTreeMap<String, String>,
        fingerprint: &ClientFingerprint,
    ) -> Result<TokenPair, TokenError> {
        let access = self
            .issue(TokenKind::Access, user_id, extra_claims, fingerprint)
            .await?;
        let refresh = self
            .issue(TokenKind::Refresh, user_id, extra_claims, fingerprint)
            .await?;

        self.identity.update_last_login(user_id).await?;

        Ok(TokenPair { access, refresh })
    }
}
