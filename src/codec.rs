//! Claim-set encoding and decoding, independent of transport.
//!
//! The codec stamps `token_kind` and `expires_at` at encode time from the
//! configured per-kind TTL, and merges the configured passthrough claim
//! fields with the caller-supplied snapshot.

use crate::claims::{TokenClaims, TokenKind};
use crate::config::{Config, ExtraClaimSpec};
use crate::error::TokenError;
use crate::fingerprint::ClientFingerprint;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use uuid::Uuid;

pub struct TokenCodec {
    access_ttl: Duration,
    refresh_ttl: Duration,
    extra_claim_fields: HashMap<TokenKind, Vec<ExtraClaimSpec>>,
}

impl TokenCodec {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            access_ttl: config.access_token_ttl,
            refresh_ttl: config.refresh_token_ttl,
            extra_claim_fields: config.extra_claim_fields.clone(),
        }
    }

    /// Build and serialize the claim set for a token.
    ///
    /// Refresh tokens carry only `device_name`; access tokens carry both
    /// fingerprint fields.
    pub fn encode(
        &self,
        kind: TokenKind,
        user_id: i64,
        nonce: Uuid,
        fingerprint: &ClientFingerprint,
        extra: &BTreeMap<String, String>,
    ) -> Result<Vec<u8>, TokenError> {
        let ttl = match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        };
        let expires_at = chrono::Utc::now().timestamp() + ttl.as_secs() as i64;

        let mut merged = BTreeMap::new();
        if let Some(specs) = self.extra_claim_fields.get(&kind) {
            for spec in specs {
                let value = extra
                    .get(&spec.name)
                    .cloned()
                    .unwrap_or_else(|| spec.default.clone());
                merged.insert(spec.name.clone(), value);
            }
        }

        let claims = TokenClaims {
            token_kind: kind,
            user_id,
            nonce,
            device_name: fingerprint.device_name.clone(),
            ip_address: match kind {
                TokenKind::Access => Some(fingerprint.ip_address.clone()),
                TokenKind::Refresh => None,
            },
            expires_at,
            extra: merged,
        };

        serde_json::to_vec(&claims)
            .map_err(|e| TokenError::internal(format!("Serialization failed: {}", e)))
    }

    /// Parse a decrypted payload back into a claim set.
    ///
    /// # Errors
    ///
    /// `TokenError::Malformed` when the payload is not valid JSON or lacks
    /// the required fields (`token_kind`, `user_id`, `nonce`, `expires_at`).
    pub fn decode(&self, plaintext: &[u8]) -> Result<TokenClaims, TokenError> {
        serde_json::from_slice(plaintext).map_err(|e| TokenError::Malformed(e.to_string()))
    }
}
