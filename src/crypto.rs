//! Symmetric sealing of token payloads.
//!
//! AES-256-GCM with a random 96-bit nonce prepended to the ciphertext,
//! base64-encoded for the wire. The authenticated mode means any tampering
//! or wrong-key decryption fails closed as `DecryptionFailed`.

use crate::error::TokenError;
use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand::RngCore;
use zeroize::Zeroizing;

/// AES-GCM nonce length in bytes.
const NONCE_LEN: usize = 12;

/// Seals and opens opaque token payloads under a single process-wide key.
#[derive(Clone)]
pub struct TokenCipher {
    cipher: Aes256Gcm,
}

impl TokenCipher {
    #[must_use]
    pub fn new(key: [u8; 32]) -> Self {
        let key = Zeroizing::new(key);
        Self {
            cipher: Aes256Gcm::new((&*key).into()),
        }
    }

    /// Encrypt a plaintext payload into the opaque wire string.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Internal` if encryption itself fails.
    pub fn seal(&self, plaintext: &[u8]) -> Result<String, TokenError> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext)
            .map_err(|_| TokenError::internal("Encryption failed"))?;

        let mut wire = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        wire.extend_from_slice(&nonce_bytes);
        wire.extend_from_slice(&ciphertext);

        Ok(STANDARD.encode(wire))
    }

    /// Decrypt an opaque wire string back into the plaintext payload.
    ///
    /// # Errors
    ///
    /// `InvalidCiphertext` when the base64 envelope cannot be decoded;
    /// `DecryptionFailed` when the payload is truncated, tampered with,
    /// or sealed under a different key.
    pub fn open(&self, token: &str) -> Result<Vec<u8>, TokenError> {
        let wire = STANDARD
            .decode(token)
            .map_err(|e| TokenError::InvalidCiphertext(e.to_string()))?;

        if wire.len() <= NONCE_LEN {
            return Err(TokenError::DecryptionFailed);
        }

        let (nonce_bytes, ciphertext) = wire.split_at(NONCE_LEN);
        self.cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|_| TokenError::DecryptionFailed)
    }
}
