//! Token validation and refresh.
//!
//! Validation runs a fixed pipeline: decrypt, decode, expiry check,
//! fingerprint check (kind-dependent), authoritative-nonce check. The first
//! failing stage rejects with its reason; nothing below this boundary
//! escapes as a raw I/O error.

use crate::claims::{TokenClaims, TokenKind};
use crate::codec::TokenCodec;
use crate::config::Config;
use crate::crypto::TokenCipher;
use crate::error::TokenError;
use crate::fingerprint::ClientFingerprint;
use crate::identity::{AuthenticatedUser, IdentityStore};
use crate::issuer::TokenIssuer;
use crate::metrics::TOKENS_VALIDATED;
use crate::store::NonceStore;
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tracing::{debug, warn};

pub struct TokenValidator {
    config: Arc<Config>,
    store: Arc<NonceStore>,
    codec: TokenCodec,
    cipher: TokenCipher,
    identity: Arc<dyn IdentityStore>,
    issuer: Arc<TokenIssuer>,
}

impl TokenValidator {
    #[must_use]
    pub fn new(
        config: Arc<Config>,
        store: Arc<NonceStore>,
        identity: Arc<dyn IdentityStore>,
        issuer: Arc<TokenIssuer>,
    ) -> Self {
        Self {
            codec: TokenCodec::from_config(&config),
            cipher: TokenCipher::new(config.encryption_key),
            config,
            store,
            identity,
            issuer,
        }
    }

    /// Accept or reject an inbound token.
    ///
    /// On success returns the parsed claims; every rejection carries a
    /// machine-distinguishable reason (see `TokenError::reason`).
    pub async fn validate(
        &self,
        raw_token: &str,
        fingerprint: &ClientFingerprint,
    ) -> Result<TokenClaims, TokenError> {
        match self.run_checks(raw_token, fingerprint).await {
            Ok(claims) => {
                TOKENS_VALIDATED
                    .with_label_values(&[claims.token_kind.as_str(), "accepted"])
                    .inc();
                debug!(user_id = claims.user_id, kind = %claims.token_kind, "Token accepted");
                Ok(claims)
            }
            Err(e) => {
                TOKENS_VALIDATED
                    .with_label_values(&["unknown", e.reason()])
                    .inc();
                Err(e)
            }
        }
    }

    async fn run_checks(
        &self,
        raw_token: &str,
        fingerprint: &ClientFingerprint,
    ) -> Result<TokenClaims, TokenError> {
        let plaintext = self.cipher.open(raw_token)?;
        let claims = self.codec.decode(&plaintext)?;

        if claims.is_expired() {
            return Err(TokenError::Expired);
        }

        // Kind-dependent fingerprint binding: refresh tokens are bound to
        // the device only, access tokens to device and address.
        if claims.device_name != fingerprint.device_name {
            warn!(user_id = claims.user_id, kind = %claims.token_kind, "Device name mismatch");
            return Err(TokenError::FingerprintMismatch("device_name"));
        }
        if claims.token_kind == TokenKind::Access
            && claims.ip_address.as_deref() != Some(fingerprint.ip_address.as_str())
        {
            warn!(user_id = claims.user_id, "IP address mismatch");
            return Err(TokenError::FingerprintMismatch("ip_address"));
        }

        // The authoritative nonce decides: rotation invalidates every token
        // minted before it.
        let current = self
            .store
            .get_or_create(claims.user_id, claims.token_kind)
            .await?;
        let matches: bool = current.as_bytes()[..]
            .ct_eq(&claims.nonce.as_bytes()[..])
            .into();
        if !matches {
            warn!(user_id = claims.user_id, kind = %claims.token_kind, "Stale nonce presented");
            return Err(TokenError::NonceMismatch);
        }

        Ok(claims)
    }

    /// Validate a refresh token and mint a fresh access token from the
    /// current identity snapshot.
    ///
    /// Outstanding access tokens stay valid: the access nonce is re-derived
    /// through the same issuance path as login, not rotated here.
    pub async fn refresh(
        &self,
        raw_refresh_token: &str,
        fingerprint: &ClientFingerprint,
    ) -> Result<String, TokenError> {
        let claims = self.validate(raw_refresh_token, fingerprint).await?;

        if claims.token_kind != TokenKind::Refresh {
            return Err(TokenError::Malformed(
                "refresh requires a refresh token".to_string(),
            ));
        }

        let snapshot = self
            .identity
            .get_user(claims.user_id)
            .await?
            .ok_or(TokenError::UserNotFound(claims.user_id))?;

        self.identity.update_last_login(claims.user_id).await?;

        self.issuer
            .issue(TokenKind::Access, claims.user_id, &snapshot.fields, fingerprint)
            .await
    }

    /// Materialize the authenticated user for validated claims.
    pub async fn resolve_user(&self, claims: &TokenClaims) -> Result<AuthenticatedUser, TokenError> {
        if self.config.resolve_user_by_access_token {
            return Ok(AuthenticatedUser::from_claims(claims));
        }

        let snapshot = self
            .identity
            .get_user(claims.user_id)
            .await?
            .ok_or(TokenError::UserNotFound(claims.user_id))?;

        Ok(AuthenticatedUser::from_snapshot(snapshot))
    }
}
