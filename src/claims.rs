use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Token kind discriminator carried inside every claim set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    /// Short-lived, used for API calls.
    Access,
    /// Long-lived, used only to mint new access tokens.
    Refresh,
}

impl TokenKind {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Access => "access",
            Self::Refresh => "refresh",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decrypted claim set of a session token.
///
/// `extra` holds the configured passthrough fields (username, email, ...)
/// copied from the identity record at issuance; this subsystem never
/// interprets them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TokenClaims {
    pub token_kind: TokenKind,
    pub user_id: i64,
    pub nonce: Uuid,
    #[serde(default)]
    pub device_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    /// Unix timestamp in seconds.
    pub expires_at: i64,
    #[serde(flatten)]
    pub extra: BTreeMap<String, String>,
}

impl TokenClaims {
    /// A token expiring exactly now is already expired, so a zero TTL
    /// yields a token that never validates.
    pub fn is_expired(&self) -> bool {
        let now = chrono::Utc::now().timestamp();
        self.expires_at <= now
    }

    pub fn is_valid_at(&self, timestamp: i64) -> bool {
        timestamp < self.expires_at
    }
}
