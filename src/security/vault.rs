//! At-rest encryption of credential bundle fields.
//!
//! Fields whose names match the sensitive-name heuristic are sealed with
//! AES-256-GCM before persistence and transparently opened for executor
//! use. The key is process-wide configuration managed outside the engine.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rand::RngCore;
use std::collections::HashMap;
use thiserror::Error;

/// Prefix marking a sealed field value.
const SEALED_PREFIX: &str = "vault:";

const SENSITIVE_MARKERS: &[&str] = &[
    "password",
    "secret",
    "token",
    "api_key",
    "apikey",
    "private_key",
    "credential",
    "auth",
];

#[derive(Debug, Error)]
pub enum VaultError {
    #[error("Invalid vault key: {0}")]
    InvalidKey(String),
    #[error("Encryption failed")]
    EncryptFailed,
    #[error("Decryption failed for field '{0}'")]
    DecryptFailed(String),
    #[error("Malformed sealed value for field '{0}'")]
    Malformed(String),
}

pub struct CredentialVault {
    cipher: Aes256Gcm,
}

impl std::fmt::Debug for CredentialVault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialVault").finish_non_exhaustive()
    }
}

impl CredentialVault {
    /// Key is 32 bytes, base64-encoded, supplied by configuration.
    pub fn new(key_base64: &str) -> Result<Self, VaultError> {
        let key_bytes = BASE64
            .decode(key_base64)
            .map_err(|e| VaultError::InvalidKey(e.to_string()))?;
        let cipher = Aes256Gcm::new_from_slice(&key_bytes)
            .map_err(|_| VaultError::InvalidKey("key must be 32 bytes".into()))?;
        Ok(Self { cipher })
    }

    /// Whether a field name triggers encryption on write.
    pub fn is_sensitive_field(name: &str) -> bool {
        let lower = name.to_lowercase();
        SENSITIVE_MARKERS.iter().any(|m| lower.contains(m))
    }

    /// Seal the sensitive fields of a bundle for persistence. Already
    /// sealed and non-sensitive fields pass through unchanged.
    pub fn seal_bundle(
        &self,
        bundle: &HashMap<String, String>,
    ) -> Result<HashMap<String, String>, VaultError> {
        let mut out = HashMap::with_capacity(bundle.len());
        for (name, value) in bundle {
            let sealed = if Self::is_sensitive_field(name) && !value.starts_with(SEALED_PREFIX) {
                self.seal(value)?
            } else {
                value.clone()
            };
            out.insert(name.clone(), sealed);
        }
        Ok(out)
    }

    /// Open a persisted bundle for executor use, decrypting every sealed
    /// field.
    pub fn open_bundle(
        &self,
        bundle: &HashMap<String, String>,
    ) -> Result<HashMap<String, String>, VaultError> {
        let mut out = HashMap::with_capacity(bundle.len());
        for (name, value) in bundle {
            let opened = match value.strip_prefix(SEALED_PREFIX) {
                Some(sealed) => self.open(name, sealed)?,
                None => value.clone(),
            };
            out.insert(name.clone(), opened);
        }
        Ok(out)
    }

    fn seal(&self, plaintext: &str) -> Result<String, VaultError> {
        let mut nonce_bytes = [0u8; 12];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);
        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|_| VaultError::EncryptFailed)?;
        let mut blob = nonce_bytes.to_vec();
        blob.extend_from_slice(&ciphertext);
        Ok(format!("{SEALED_PREFIX}{}", BASE64.encode(blob)))
    }

    fn open(&self, field: &str, sealed: &str) -> Result<String, VaultError> {
        let blob = BASE64
            .decode(sealed)
            .map_err(|_| VaultError::Malformed(field.to_string()))?;
        if blob.len() < 12 {
            return Err(VaultError::Malformed(field.to_string()));
        }
        let (nonce_bytes, ciphertext) = blob.split_at(12);
        let nonce = Nonce::from_slice(nonce_bytes);
        let plaintext = self
            .cipher
            .decrypt(nonce, ciphertext)
            .map_err(|_| VaultError::DecryptFailed(field.to_string()))?;
        String::from_utf8(plaintext).map_err(|_| VaultError::DecryptFailed(field.to_string()))
    }
}
