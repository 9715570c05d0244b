use crate::claims::TokenKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Durable per-(user, kind) nonce record.
///
/// For a given `(user_id, token_kind)` pair exactly one current nonce is
/// authoritative; any token bearing a stale nonce is rejected. Records are
/// soft-deleted only, never physically removed in normal operation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthNonceRecord {
    pub user_id: i64,
    pub token_kind: TokenKind,
    pub nonce: Uuid,
    pub device_login_count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl AuthNonceRecord {
    pub fn new(user_id: i64, token_kind: TokenKind, nonce: Uuid) -> Self {
        let now = Utc::now();
        AuthNonceRecord {
            user_id,
            token_kind,
            nonce,
            device_login_count: 0,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    /// Replace the nonce and reset the device counter, retroactively
    /// invalidating every outstanding token of this kind for this user.
    pub fn rotate(&mut self, new_nonce: Uuid) {
        self.nonce = new_nonce;
        self.device_login_count = 0;
        self.updated_at = Utc::now();
    }

    /// Count one more concurrent device login.
    pub fn record_login(&mut self) {
        self.device_login_count += 1;
        self.updated_at = Utc::now();
    }

    pub fn soft_delete(&mut self) {
        self.deleted_at = Some(Utc::now());
        self.updated_at = Utc::now();
    }

    pub fn is_active(&self) -> bool {
        self.deleted_at.is_none()
    }
}
