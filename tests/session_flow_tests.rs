//! End-to-end session flows through the public `SessionManager` surface.

use std::collections::BTreeMap;
use std::sync::Arc;
use token_sessions::identity::MemoryIdentityStore;
use token_sessions::store::{MemoryNonceCache, MemoryNonceRepository, NonceCache};
use token_sessions::{
    ClientFingerprint, Config, IdentitySource, SessionManager, TokenError, TokenKind,
};

fn fingerprint() -> ClientFingerprint {
    ClientFingerprint::new("UA-X", "1.2.3.4")
}

async fn manager_with(config: Config) -> SessionManager {
    let identity = Arc::new(MemoryIdentityStore::new());
    let mut fields = BTreeMap::new();
    fields.insert("username".to_string(), "alice".to_string());
    fields.insert("email".to_string(), "alice@example.com".to_string());
    identity.insert(42, fields).await;

    let cache: Option<Arc<dyn NonceCache>> = if config.cache_enabled {
        Some(Arc::new(MemoryNonceCache::new()))
    } else {
        None
    };

    SessionManager::new(
        config,
        Arc::new(MemoryNonceRepository::new()),
        cache,
        identity,
    )
}

fn base_config() -> Config {
    Config::default()
        .with_extra_claim(TokenKind::Access, "username", "")
        .with_extra_claim(TokenKind::Access, "email", "")
        .with_extra_claim(TokenKind::Refresh, "username", "")
}

#[tokio::test]
async fn test_login_validate_scenario() {
    let manager = manager_with(base_config()).await;

    let mut extra = BTreeMap::new();
    extra.insert("username".to_string(), "alice".to_string());

    let pair = manager.issue_pair(42, &extra, &fingerprint()).await.unwrap();

    let claims = manager.validate(&pair.access, &fingerprint()).await.unwrap();
    assert_eq!(claims.user_id, 42);
    assert_eq!(claims.token_kind, TokenKind::Access);
    assert_eq!(claims.device_name, "UA-X");
    assert_eq!(claims.ip_address.as_deref(), Some("1.2.3.4"));

    let other_ip = ClientFingerprint::new("UA-X", "9.9.9.9");
    let err = manager.validate(&pair.access, &other_ip).await.unwrap_err();
    assert_eq!(err.reason(), "fingerprint_mismatch");
}

#[tokio::test]
async fn test_refresh_flow() {
    let manager = manager_with(base_config()).await;

    let pair = manager
        .issue_pair(42, &BTreeMap::new(), &fingerprint())
        .await
        .unwrap();

    let new_access = manager.refresh(&pair.refresh, &fingerprint()).await.unwrap();

    let claims = manager.validate(&new_access, &fingerprint()).await.unwrap();
    assert_eq!(claims.token_kind, TokenKind::Access);
    // Extra claims re-populated from the identity record at refresh time
    assert_eq!(claims.extra["username"], "alice");

    // Original access token still validates: refresh does not rotate the
    // access nonce
    assert!(manager.validate(&pair.access, &fingerprint()).await.is_ok());
}

#[tokio::test]
async fn test_refresh_with_wrong_device_rejected() {
    let manager = manager_with(base_config()).await;

    let pair = manager
        .issue_pair(42, &BTreeMap::new(), &fingerprint())
        .await
        .unwrap();

    let other_device = ClientFingerprint::new("UA-Y", "1.2.3.4");
    let err = manager
        .refresh(&pair.refresh, &other_device)
        .await
        .unwrap_err();
    assert_eq!(err.reason(), "fingerprint_mismatch");
}

#[tokio::test]
async fn test_device_limit_kicks_older_sessions() {
    let manager = manager_with(base_config().with_device_limit(2)).await;

    let t1 = manager
        .issue_pair(42, &BTreeMap::new(), &fingerprint())
        .await
        .unwrap();
    let t2 = manager
        .issue_pair(42, &BTreeMap::new(), &fingerprint())
        .await
        .unwrap();

    // Both sessions valid while under the limit
    assert!(manager.validate(&t1.access, &fingerprint()).await.is_ok());
    assert!(manager.validate(&t2.access, &fingerprint()).await.is_ok());

    // Third login breaches the limit and rotates the nonce
    let t3 = manager
        .issue_pair(42, &BTreeMap::new(), &fingerprint())
        .await
        .unwrap();

    let e1 = manager
        .validate(&t1.access, &fingerprint())
        .await
        .unwrap_err();
    let e2 = manager
        .validate(&t2.access, &fingerprint())
        .await
        .unwrap_err();
    assert!(matches!(e1, TokenError::NonceMismatch));
    assert!(matches!(e2, TokenError::NonceMismatch));

    assert!(manager.validate(&t3.access, &fingerprint()).await.is_ok());
    assert!(manager.validate(&t3.refresh, &fingerprint()).await.is_ok());
}

#[tokio::test]
async fn test_no_device_limit_keeps_all_sessions() {
    let manager = manager_with(base_config()).await;

    let mut pairs = Vec::new();
    for _ in 0..5 {
        pairs.push(
            manager
                .issue_pair(42, &BTreeMap::new(), &fingerprint())
                .await
                .unwrap(),
        );
    }

    for pair in &pairs {
        assert!(manager.validate(&pair.access, &fingerprint()).await.is_ok());
        assert!(manager.validate(&pair.refresh, &fingerprint()).await.is_ok());
    }
}

#[tokio::test]
async fn test_cache_disabled_flow() {
    let manager = manager_with(base_config().with_cache_enabled(false)).await;

    let pair = manager
        .issue_pair(42, &BTreeMap::new(), &fingerprint())
        .await
        .unwrap();

    assert!(manager.validate(&pair.access, &fingerprint()).await.is_ok());
    assert!(manager.refresh(&pair.refresh, &fingerprint()).await.is_ok());
}

#[tokio::test]
async fn test_resolve_user_via_store_and_claims() {
    let manager = manager_with(base_config()).await;
    let pair = manager
        .issue_pair(42, &BTreeMap::new(), &fingerprint())
        .await
        .unwrap();
    let claims = manager.validate(&pair.access, &fingerprint()).await.unwrap();

    let user = manager.resolve_user(&claims).await.unwrap();
    assert_eq!(user.user_id, 42);
    assert_eq!(user.source, IdentitySource::Store);
    assert_eq!(user.fields["email"], "alice@example.com");

    // Claims-resolution mode never consults the store
    let claims_manager =
        manager_with(base_config().with_resolve_user_by_access_token(true)).await;
    let mut extra = BTreeMap::new();
    extra.insert("username".to_string(), "alice".to_string());
    let pair = claims_manager
        .issue_pair(42, &extra, &fingerprint())
        .await
        .unwrap();
    let claims = claims_manager
        .validate(&pair.access, &fingerprint())
        .await
        .unwrap();

    let user = claims_manager.resolve_user(&claims).await.unwrap();
    assert_eq!(user.source, IdentitySource::Claims);
    assert_eq!(user.fields["username"], "alice");
}

#[tokio::test]
async fn test_tokens_are_opaque_and_unique() {
    let manager = manager_with(base_config()).await;

    let p1 = manager
        .issue_pair(42, &BTreeMap::new(), &fingerprint())
        .await
        .unwrap();
    let p2 = manager
        .issue_pair(42, &BTreeMap::new(), &fingerprint())
        .await
        .unwrap();

    // Randomized sealing: identical claims never produce identical tokens
    assert_ne!(p1.access, p2.access);
    assert_ne!(p1.refresh, p2.refresh);
    assert!(!p1.access.contains('.'));
}

#[tokio::test]
async fn test_unknown_user_login_rejected() {
    let manager = manager_with(base_config()).await;

    let err = manager
        .issue_pair(7, &BTreeMap::new(), &fingerprint())
        .await
        .unwrap_err();
    assert!(matches!(err, TokenError::UserNotFound(7)));
}
