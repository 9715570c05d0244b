//! Prometheus metrics for the session token layer.

use once_cell::sync::Lazy;
use prometheus::{register_counter_vec, CounterVec};

/// Tokens issued counter.
pub static TOKENS_ISSUED: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "token_sessions_tokens_issued_total",
        "Total number of tokens issued",
        &["kind"]
    )
    .expect("Failed to register tokens_issued metric")
});

/// Token validations counter.
pub static TOKENS_VALIDATED: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "token_sessions_tokens_validated_total",
        "Total number of token validations",
        &["kind", "status"]
    )
    .expect("Failed to register tokens_validated metric")
});

/// Nonce rotations counter.
pub static NONCE_ROTATIONS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "token_sessions_nonce_rotations_total",
        "Total number of nonce rotations",
        &["kind", "reason"]
    )
    .expect("Failed to register nonce_rotations metric")
});

/// Cache operations counter.
pub static CACHE_OPERATIONS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "token_sessions_cache_operations_total",
        "Total number of nonce cache operations",
        &["operation", "status"]
    )
    .expect("Failed to register cache_operations metric")
});
