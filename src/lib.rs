//! Encrypted session token layer.
//!
//! Issues paired access/refresh tokens sealed with AES-256-GCM, binds each
//! token to a client fingerprint (device + IP), keeps a rotating
//! per-(user, kind) validation nonce in a cache-backed store, and enforces
//! an optional concurrent-device limit by forcibly rotating that nonce.

#![forbid(unsafe_code)]

pub mod claims;
pub mod codec;
pub mod config;
pub mod crypto;
pub mod error;
pub mod fingerprint;
pub mod identity;
pub mod issuer;
pub mod limit;
pub mod manager;
pub mod metrics;
pub mod store;
pub mod validator;

// Re-exports for convenience
pub use claims::{TokenClaims, TokenKind};
pub use config::Config;
pub use error::TokenError;
pub use fingerprint::ClientFingerprint;
pub use identity::{AuthenticatedUser, IdentitySnapshot, IdentitySource, IdentityStore};
pub use issuer::TokenPair;
pub use manager::SessionManager;
