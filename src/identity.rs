//! Identity store seam.
//!
//! The user record itself is an external collaborator; this subsystem only
//! touches existence, a claim-field snapshot, and the `last_login`
//! timestamp.

use crate::claims::TokenClaims;
use crate::error::TokenError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

/// Snapshot of the identity record at a point in time. `fields` is the
/// passthrough claim material (username, email, ...), opaque to this layer.
#[derive(Debug, Clone, PartialEq)]
pub struct IdentitySnapshot {
    pub user_id: i64,
    pub fields: BTreeMap<String, String>,
    pub last_login: Option<DateTime<Utc>>,
}

/// Where an authenticated user object was materialized from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentitySource {
    /// Synthesized purely from token claims, no store round-trip.
    Claims,
    /// Looked up in the identity store.
    Store,
}

/// User object handed to the application after successful validation.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthenticatedUser {
    pub user_id: i64,
    pub fields: BTreeMap<String, String>,
    pub source: IdentitySource,
}

impl AuthenticatedUser {
    #[must_use]
    pub fn from_claims(claims: &TokenClaims) -> Self {
        Self {
            user_id: claims.user_id,
            fields: claims.extra.clone(),
            source: IdentitySource::Claims,
        }
    }

    #[must_use]
    pub fn from_snapshot(snapshot: IdentitySnapshot) -> Self {
        Self {
            user_id: snapshot.user_id,
            fields: snapshot.fields,
            source: IdentitySource::Store,
        }
    }
}

#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn get_user(&self, user_id: i64) -> Result<Option<IdentitySnapshot>, TokenError>;

    async fn update_last_login(&self, user_id: i64) -> Result<(), TokenError>;
}

/// In-memory identity store for tests and embedded deployments.
pub struct MemoryIdentityStore {
    users: RwLock<HashMap<i64, IdentitySnapshot>>,
}

impl MemoryIdentityStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            users: RwLock::new(HashMap::new()),
        }
    }

    pub async fn insert(&self, user_id: i64, fields: BTreeMap<String, String>) {
        let mut users = self.users.write().await;
        users.insert(
            user_id,
            IdentitySnapshot {
                user_id,
                fields,
                last_login: None,
            },
        );
    }

    pub async fn remove(&self, user_id: i64) {
        let mut users = self.users.write().await;
        users.remove(&user_id);
    }
}

impl Default for MemoryIdentityStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IdentityStore for MemoryIdentityStore {
    async fn get_user(&self, user_id: i64) -> Result<Option<IdentitySnapshot>, TokenError> {
        let users = self.users.read().await;
        Ok(users.get(&user_id).cloned())
    }

    async fn update_last_login(&self, user_id: i64) -> Result<(), TokenError> {
        let mut users = self.users.write().await;
        match users.get_mut(&user_id) {
            Some(snapshot) => {
                snapshot.last_login = Some(Utc::now());
                Ok(())
            }
            None => Err(TokenError::UserNotFound(user_id)),
        }
    }
}
