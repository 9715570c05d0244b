//! Durable persistence seam for nonce records.
//!
//! The backing store must enforce a uniqueness constraint on `nonce`; the
//! in-memory implementation models that constraint so the bounded
//! collision-retry behavior is exercised the same way a SQL deployment
//! would exercise it.

use crate::claims::TokenKind;
use crate::store::record::AuthNonceRecord;
use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum RepositoryError {
    /// The uniqueness constraint on `nonce` tripped.
    #[error("nonce already in use")]
    DuplicateNonce,

    #[error("record not found")]
    NotFound,

    #[error("backend error: {0}")]
    Backend(String),
}

#[async_trait]
pub trait NonceRepository: Send + Sync {
    /// Fetch the active record for `(user_id, kind)`, if any.
    async fn find(
        &self,
        user_id: i64,
        kind: TokenKind,
    ) -> Result<Option<AuthNonceRecord>, RepositoryError>;

    /// Persist a new record. Fails with `DuplicateNonce` when the nonce is
    /// already held by another record.
    async fn insert(&self, record: AuthNonceRecord) -> Result<(), RepositoryError>;

    /// Overwrite the record for `(user_id, kind)`. Fails with
    /// `DuplicateNonce` when the new nonce is held by a different record.
    async fn update(&self, record: &AuthNonceRecord) -> Result<(), RepositoryError>;

    /// Soft-delete every record belonging to a user (account-deletion
    /// collaborator hook). Returns the number of records affected.
    async fn soft_delete_user(&self, user_id: i64) -> Result<u32, RepositoryError>;
}

struct MemoryInner {
    records: HashMap<(i64, TokenKind), AuthNonceRecord>,
    /// Models the backing store's uniqueness constraint: nonce -> owner key.
    nonce_owners: HashMap<Uuid, (i64, TokenKind)>,
}

/// In-memory repository for tests and embedded deployments.
pub struct MemoryNonceRepository {
    inner: RwLock<MemoryInner>,
}

impl MemoryNonceRepository {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryInner {
                records: HashMap::new(),
                nonce_owners: HashMap::new(),
            }),
        }
    }
}

impl Default for MemoryNonceRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NonceRepository for MemoryNonceRepository {
    async fn find(
        &self,
        user_id: i64,
        kind: TokenKind,
    ) -> Result<Option<AuthNonceRecord>, RepositoryError> {
        let inner = self.inner.read().await;
        Ok(inner
            .records
            .get(&(user_id, kind))
            .filter(|record| record.is_active())
            .cloned())
    }

    async fn insert(&self, record: AuthNonceRecord) -> Result<(), RepositoryError> {
        let mut inner = self.inner.write().await;
        let key = (record.user_id, record.token_kind);

        if let Some(owner) = inner.nonce_owners.get(&record.nonce) {
            if *owner != key {
                return Err(RepositoryError::DuplicateNonce);
            }
        }

        // A concurrent creator may have written first; the last write to the
        // record wins, matching the documented get-or-create race.
        if let Some(previous) = inner.records.insert(key, record.clone()) {
            inner.nonce_owners.remove(&previous.nonce);
        }
        inner.nonce_owners.insert(record.nonce, key);

        Ok(())
    }

    async fn update(&self, record: &AuthNonceRecord) -> Result<(), RepositoryError> {
        let mut inner = self.inner.write().await;
        let key = (record.user_id, record.token_kind);

        if !inner.records.contains_key(&key) {
            return Err(RepositoryError::NotFound);
        }

        if let Some(owner) = inner.nonce_owners.get(&record.nonce) {
            if *owner != key {
                return Err(RepositoryError::DuplicateNonce);
            }
        }

        if let Some(previous) = inner.records.insert(key, record.clone()) {
            inner.nonce_owners.remove(&previous.nonce);
        }
        inner.nonce_owners.insert(record.nonce, key);

        Ok(())
    }

    async fn soft_delete_user(&self, user_id: i64) -> Result<u32, RepositoryError> {
        let mut inner = self.inner.write().await;
        let mut affected = 0;

        for record in inner.records.values_mut() {
            if record.user_id == user_id && record.is_active() {
                record.soft_delete();
                affected += 1;
            }
        }

        Ok(affected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_insert_and_find() {
        let repo = MemoryNonceRepository::new();
        let record = AuthNonceRecord::new(42, TokenKind::Access, Uuid::new_v4());

        repo.insert(record.clone()).await.unwrap();

        let found = repo.find(42, TokenKind::Access).await.unwrap();
        assert_eq!(found, Some(record));
        assert!(repo.find(42, TokenKind::Refresh).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_nonce_rejected() {
        let repo = MemoryNonceRepository::new();
        let nonce = Uuid::new_v4();

        repo.insert(AuthNonceRecord::new(1, TokenKind::Access, nonce))
            .await
            .unwrap();

        let result = repo
            .insert(AuthNonceRecord::new(2, TokenKind::Access, nonce))
            .await;
        assert!(matches!(result, Err(RepositoryError::DuplicateNonce)));
    }

    #[tokio::test]
    async fn test_update_swaps_nonce_ownership() {
        let repo = MemoryNonceRepository::new();
        let mut record = AuthNonceRecord::new(42, TokenKind::Access, Uuid::new_v4());
        repo.insert(record.clone()).await.unwrap();

        let old_nonce = record.nonce;
        record.rotate(Uuid::new_v4());
        repo.update(&record).await.unwrap();

        // The old nonce is released and can be claimed by another record
        repo.insert(AuthNonceRecord::new(7, TokenKind::Access, old_nonce))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_update_missing_record() {
        let repo = MemoryNonceRepository::new();
        let record = AuthNonceRecord::new(42, TokenKind::Access, Uuid::new_v4());

        assert!(matches!(
            repo.update(&record).await,
            Err(RepositoryError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_soft_deleted_invisible_to_find() {
        let repo = MemoryNonceRepository::new();
        repo.insert(AuthNonceRecord::new(42, TokenKind::Access, Uuid::new_v4()))
            .await
            .unwrap();
        repo.insert(AuthNonceRecord::new(42, TokenKind::Refresh, Uuid::new_v4()))
            .await
            .unwrap();

        let affected = repo.soft_delete_user(42).await.unwrap();
        assert_eq!(affected, 2);
        assert!(repo.find(42, TokenKind::Access).await.unwrap().is_none());
        assert!(repo.find(42, TokenKind::Refresh).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_concurrent_creation_last_write_wins() {
        let repo = MemoryNonceRepository::new();
        let first = AuthNonceRecord::new(42, TokenKind::Access, Uuid::new_v4());
        let second = AuthNonceRecord::new(42, TokenKind::Access, Uuid::new_v4());

        repo.insert(first.clone()).await.unwrap();
        repo.insert(second.clone()).await.unwrap();

        let found = repo.find(42, TokenKind::Access).await.unwrap().unwrap();
        assert_eq!(found.nonce, second.nonce);
    }
}
