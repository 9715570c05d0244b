//! Centralized configuration for the session token layer.
//!
//! Configuration is loaded from environment variables and validated at
//! startup, or constructed programmatically for embedding and tests.
//! Read-only after construction; pass by `Arc` into issuer/validator.

use crate::claims::TokenKind;
use crate::error::TokenError;
use std::collections::HashMap;
use std::env;
use std::time::Duration;
use zeroize::Zeroizing;

/// One configured passthrough claim field: populated from the identity
/// snapshot at issuance, falling back to `default` when absent.
#[derive(Debug, Clone)]
pub struct ExtraClaimSpec {
    pub name: String,
    pub default: String,
}

/// Session token configuration.
#[derive(Debug, Clone)]
pub struct Config {
    // Token lifetimes
    /// Access token TTL
    pub access_token_ttl: Duration,
    /// Refresh token TTL
    pub refresh_token_ttl: Duration,

    // Claims
    /// Extra passthrough claim fields per token kind
    pub extra_claim_fields: HashMap<TokenKind, Vec<ExtraClaimSpec>>,

    // Security
    /// Encryption key for token payloads (32 bytes for AES-256)
    pub encryption_key: [u8; 32],

    // Nonce store
    /// Whether the cache tier sits in front of the durable store
    pub cache_enabled: bool,
    /// TTL for cached nonce entries
    pub nonce_cache_ttl: Duration,
    /// Retry ceiling for nonce uniqueness collisions
    pub nonce_create_retries: u32,
    /// Redis address for the cache tier
    pub redis_url: String,

    // Policy
    /// Concurrent-device limit per (user, kind); `None` disables the feature
    pub device_limit: Option<u32>,
    /// Synthesize the user from access-token claims instead of the identity store
    pub resolve_user_by_access_token: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            access_token_ttl: Duration::from_secs(600),
            refresh_token_ttl: Duration::from_secs(30 * 24 * 3600),
            extra_claim_fields: HashMap::new(),
            encryption_key: generate_key(),
            cache_enabled: true,
            nonce_cache_ttl: Duration::from_secs(30 * 24 * 3600),
            nonce_create_retries: 5,
            redis_url: "redis://127.0.0.1:6379".to_string(),
            device_limit: None,
            resolve_user_by_access_token: false,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is present but invalid.
    pub fn from_env() -> Result<Self, TokenError> {
        dotenvy::dotenv().ok();

        let access_token_ttl = Duration::from_secs(parse_env("ACCESS_TOKEN_TTL", 600)?);
        let refresh_token_ttl = Duration::from_secs(parse_env("REFRESH_TOKEN_TTL", 2_592_000)?);

        let cache_enabled = parse_env("NONCE_CACHE_ENABLED", true)?;
        let nonce_cache_ttl = Duration::from_secs(parse_env("NONCE_CACHE_TTL", 2_592_000)?);
        let nonce_create_retries = parse_env("NONCE_CREATE_RETRIES", 5)?;
        let redis_url =
            env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());

        let device_limit = match env::var("DEVICE_LIMIT") {
            Ok(val) => {
                let limit: u32 = val
                    .parse()
                    .map_err(|e| TokenError::config(format!("Invalid DEVICE_LIMIT: {}", e)))?;
                if limit == 0 {
                    return Err(TokenError::config("DEVICE_LIMIT must be positive"));
                }
                Some(limit)
            }
            Err(_) => None,
        };

        let resolve_user_by_access_token = parse_env("RESOLVE_USER_BY_ACCESS_TOKEN", false)?;
        let encryption_key = parse_encryption_key()?;

        Ok(Self {
            access_token_ttl,
            refresh_token_ttl,
            extra_claim_fields: HashMap::new(),
            encryption_key,
            cache_enabled,
            nonce_cache_ttl,
            nonce_create_retries,
            redis_url,
            device_limit,
            resolve_user_by_access_token,
        })
    }

    /// TTL for the given token kind.
    #[must_use]
    pub const fn ttl(&self, kind: TokenKind) -> Duration {
        match kind {
            TokenKind::Access => self.access_token_ttl,
            TokenKind::Refresh => self.refresh_token_ttl,
        }
    }

    /// Register a passthrough claim field for a token kind.
    #[must_use]
    pub fn with_extra_claim(
        mut self,
        kind: TokenKind,
        name: impl Into<String>,
        default: impl Into<String>,
    ) -> Self {
        self.extra_claim_fields
            .entry(kind)
            .or_default()
            .push(ExtraClaimSpec {
                name: name.into(),
                default: default.into(),
            });
        self
    }

    #[must_use]
    pub const fn with_access_token_ttl(mut self, ttl: Duration) -> Self {
        self.access_token_ttl = ttl;
        self
    }

    #[must_use]
    pub const fn with_refresh_token_ttl(mut self, ttl: Duration) -> Self {
        self.refresh_token_ttl = ttl;
        self
    }

    #[must_use]
    pub const fn with_device_limit(mut self, limit: u32) -> Self {
        self.device_limit = Some(limit);
        self
    }

    #[must_use]
    pub const fn with_cache_enabled(mut self, enabled: bool) -> Self {
        self.cache_enabled = enabled;
        self
    }

    #[must_use]
    pub const fn with_resolve_user_by_access_token(mut self, enabled: bool) -> Self {
        self.resolve_user_by_access_token = enabled;
        self
    }

    #[must_use]
    pub const fn with_encryption_key(mut self, key: [u8; 32]) -> Self {
        self.encryption_key = key;
        self
    }
}

/// Parse environment variable with default value.
fn parse_env<T: std::str::FromStr>(name: &str, default: T) -> Result<T, TokenError>
where
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(val) => val
            .parse()
            .map_err(|e| TokenError::config(format!("Invalid {}: {}", name, e))),
        Err(_) => Ok(default),
    }
}

/// Parse encryption key from environment.
fn parse_encryption_key() -> Result<[u8; 32], TokenError> {
    match env::var("ENCRYPTION_KEY") {
        Ok(key) => {
            let bytes = Zeroizing::new(
                base64::Engine::decode(&base64::engine::general_purpose::STANDARD, &key)
                    .map_err(|e| TokenError::config(format!("Invalid ENCRYPTION_KEY: {}", e)))?,
            );

            if bytes.len() != 32 {
                return Err(TokenError::config(format!(
                    "ENCRYPTION_KEY must be 32 bytes, got {}",
                    bytes.len()
                )));
            }

            let mut arr = [0u8; 32];
            arr.copy_from_slice(&bytes);
            Ok(arr)
        }
        Err(_) => Ok(generate_key()),
    }
}

/// Generate a random key for development and tests.
fn generate_key() -> [u8; 32] {
    use rand::RngCore;
    let mut key = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut key);
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();

        assert_eq!(config.access_token_ttl, Duration::from_secs(600));
        assert_eq!(config.refresh_token_ttl, Duration::from_secs(2_592_000));
        assert!(config.cache_enabled);
        assert_eq!(config.device_limit, None);
        assert!(!config.resolve_user_by_access_token);
        assert_eq!(config.nonce_create_retries, 5);
    }

    #[test]
    fn test_ttl_by_kind() {
        let config = Config::default()
            .with_access_token_ttl(Duration::from_secs(60))
            .with_refresh_token_ttl(Duration::from_secs(3600));

        assert_eq!(config.ttl(TokenKind::Access), Duration::from_secs(60));
        assert_eq!(config.ttl(TokenKind::Refresh), Duration::from_secs(3600));
    }

    #[test]
    fn test_extra_claim_registration() {
        let config = Config::default()
            .with_extra_claim(TokenKind::Access, "username", "")
            .with_extra_claim(TokenKind::Access, "email", "")
            .with_extra_claim(TokenKind::Refresh, "username", "");

        assert_eq!(config.extra_claim_fields[&TokenKind::Access].len(), 2);
        assert_eq!(config.extra_claim_fields[&TokenKind::Refresh].len(), 1);
    }

    #[test]
    fn test_from_env_defaults() {
        env::remove_var("ACCESS_TOKEN_TTL");
        env::remove_var("REFRESH_TOKEN_TTL");
        env::remove_var("DEVICE_LIMIT");

        let config = Config::from_env().unwrap();

        assert_eq!(config.access_token_ttl, Duration::from_secs(600));
        assert_eq!(config.refresh_token_ttl, Duration::from_secs(2_592_000));
        assert_eq!(config.device_limit, None);
    }

    #[test]
    fn test_generated_keys_differ() {
        assert_ne!(generate_key(), generate_key());
    }
}
