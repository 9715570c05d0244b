//! Concurrent-device limit enforcement.
//!
//! When the limit is configured, each issuance counts against the
//! per-(user, kind) record; breaching the limit forcibly rotates the nonce,
//! kicking every previously issued token of that kind for that user.

use crate::claims::TokenKind;
use crate::error::TokenError;
use crate::metrics::NONCE_ROTATIONS;
use crate::store::NonceStore;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

pub struct DeviceLimiter {
    store: Arc<NonceStore>,
    limit: Option<u32>,
}

impl DeviceLimiter {
    #[must_use]
    pub fn new(store: Arc<NonceStore>, limit: Option<u32>) -> Self {
        Self { store, limit }
    }

    /// Resolve the nonce to embed in a newly issued token.
    ///
    /// With no limit configured this is a plain get-or-create and nothing
    /// is counted.
    pub async fn nonce_for_issuance(
        &self,
        user_id: i64,
        kind: TokenKind,
    ) -> Result<Uuid, TokenError> {
        let Some(limit) = self.limit else {
            return self.store.get_or_create(user_id, kind).await;
        };

        let mut record = self.store.get_record(user_id, kind).await?;

        if record.device_login_count >= limit {
            warn!(
                user_id,
                kind = %kind,
                count = record.device_login_count,
                limit,
                "Device limit reached, rotating nonce"
            );
            NONCE_ROTATIONS
                .with_label_values(&[kind.as_str(), "device_limit"])
                .inc();

            self.store.rotate(user_id, kind).await?;
            record = self.store.get_record(user_id, kind).await?;
        }

        record.record_login();
        self.store.persist(&record).await?;

        Ok(record.nonce)
    }
}
