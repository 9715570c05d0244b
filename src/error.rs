use thiserror::Error;

#[derive(Error, Debug)]
pub enum TokenError {
    #[error("Ciphertext invalid: {0}")]
    InvalidCiphertext(String),

    #[error("Decryption failed")]
    DecryptionFailed,

    #[error("Malformed token: {0}")]
    Malformed(String),

    #[error("Token expired")]
    Expired,

    #[error("Fingerprint mismatch on {0}")]
    FingerprintMismatch(&'static str),

    #[error("Nonce mismatch")]
    NonceMismatch,

    #[error("User not found: {0}")]
    UserNotFound(i64),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl TokenError {
    pub fn config(msg: impl Into<String>) -> Self {
        TokenError::Config(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        TokenError::Storage(msg.into())
    }

    pub fn cache(msg: impl Into<String>) -> Self {
        TokenError::Cache(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        TokenError::Internal(msg.into())
    }

    /// Machine-distinguishable reason code for callers mapping errors to
    /// authentication-failure responses.
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            TokenError::InvalidCiphertext(_) | TokenError::DecryptionFailed => {
                TOKEN_DECRYPTION_FAILED
            }
            TokenError::Malformed(_) => TOKEN_MALFORMED,
            TokenError::Expired => TOKEN_EXPIRED,
            TokenError::FingerprintMismatch(_) => TOKEN_FINGERPRINT_MISMATCH,
            TokenError::NonceMismatch => TOKEN_NONCE_MISMATCH,
            TokenError::UserNotFound(_) => TOKEN_USER_NOT_FOUND,
            TokenError::Storage(_)
            | TokenError::Cache(_)
            | TokenError::Config(_)
            | TokenError::Internal(_) => TOKEN_INTERNAL,
        }
    }
}

impl From<redis::RedisError> for TokenError {
    fn from(err: redis::RedisError) -> Self {
        TokenError::Cache(err.to_string())
    }
}

// Reason codes for authentication-failure responses
pub const TOKEN_DECRYPTION_FAILED: &str = "decryption_failed";
pub const TOKEN_MALFORMED: &str = "malformed";
pub const TOKEN_EXPIRED: &str = "expired";
pub const TOKEN_FINGERPRINT_MISMATCH: &str = "fingerprint_mismatch";
pub const TOKEN_NONCE_MISMATCH: &str = "nonce_mismatch";
pub const TOKEN_USER_NOT_FOUND: &str = "user_not_found";
pub const TOKEN_INTERNAL: &str = "internal";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_codes() {
        assert_eq!(TokenError::DecryptionFailed.reason(), "decryption_failed");
        assert_eq!(
            TokenError::InvalidCiphertext("bad base64".into()).reason(),
            "decryption_failed"
        );
        assert_eq!(TokenError::Expired.reason(), "expired");
        assert_eq!(
            TokenError::FingerprintMismatch("ip_address").reason(),
            "fingerprint_mismatch"
        );
        assert_eq!(TokenError::NonceMismatch.reason(), "nonce_mismatch");
        assert_eq!(TokenError::UserNotFound(7).reason(), "user_not_found");
        assert_eq!(TokenError::storage("boom").reason(), "internal");
    }
}
