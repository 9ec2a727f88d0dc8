//! AES-256-GCM protection for Spotify credentials at rest.

use std::path::Path;

use aes_gcm::{
    aead::{Aead, KeyInit, OsRng},
    AeadCore, Aes256Gcm, Key, Nonce,
};

use crate::error::{OvertoneError, Result};

/// Reversible protection for opaque secret strings.
///
/// `unprotect(protect(x)) == x` must always hold; ciphertexts produced under
/// a different key fail to unprotect rather than decode to garbage.
pub trait SecretProtector: Send + Sync {
    fn protect(&self, plaintext: &str) -> Result<Vec<u8>>;
    fn unprotect(&self, ciphertext: &[u8]) -> Result<String>;
}

/// Generate a new random 256-bit encryption key.
pub fn generate_key() -> [u8; 32] {
    let mut key = [0u8; 32];
    use rand::RngCore;
    rand::thread_rng().fill_bytes(&mut key);
    key
}

/// [`SecretProtector`] backed by AES-256-GCM with a process-wide key.
///
/// Ciphertext format: nonce (12 bytes) || ciphertext. The nonce is random per
/// call, so protecting the same plaintext twice yields different bytes.
pub struct AesGcmProtector {
    key: [u8; 32],
}

impl std::fmt::Debug for AesGcmProtector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AesGcmProtector")
            .field("key", &"<redacted>")
            .finish()
    }
}

impl AesGcmProtector {
    pub fn new(key: [u8; 32]) -> Self {
        Self { key }
    }

    /// Load the key from `path`, generating and persisting a fresh one if the
    /// file does not exist yet.
    pub fn from_key_file(path: &Path) -> Result<Self> {
        match std::fs::read(path) {
            Ok(bytes) => {
                let key: [u8; 32] = bytes.as_slice().try_into().map_err(|_| {
                    OvertoneError::Protection(format!(
                        "key file {} is {} bytes, expected 32",
                        path.display(),
                        bytes.len()
                    ))
                })?;
                Ok(Self::new(key))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let key = generate_key();
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::write(path, key)?;
                tracing::info!(path = %path.display(), "generated new token encryption key");
                Ok(Self::new(key))
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl SecretProtector for AesGcmProtector {
    fn protect(&self, plaintext: &str) -> Result<Vec<u8>> {
        let cipher_key = Key::<Aes256Gcm>::from_slice(&self.key);
        let cipher = Aes256Gcm::new(cipher_key);
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

        let ciphertext = cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|e| OvertoneError::Protection(format!("encryption failed: {e}")))?;

        let mut result = Vec::with_capacity(12 + ciphertext.len());
        result.extend_from_slice(&nonce);
        result.extend_from_slice(&ciphertext);
        Ok(result)
    }

    fn unprotect(&self, ciphertext: &[u8]) -> Result<String> {
        if ciphertext.len() < 12 {
            return Err(OvertoneError::Protection(
                "ciphertext too short: missing nonce".to_string(),
            ));
        }

        let (nonce_bytes, payload) = ciphertext.split_at(12);
        let nonce = Nonce::from_slice(nonce_bytes);

        let cipher_key = Key::<Aes256Gcm>::from_slice(&self.key);
        let cipher = Aes256Gcm::new(cipher_key);

        let plaintext = cipher
            .decrypt(nonce, payload)
            .map_err(|e| OvertoneError::Protection(format!("decryption failed: {e}")))?;

        String::from_utf8(plaintext)
            .map_err(|e| OvertoneError::Protection(format!("plaintext is not UTF-8: {e}")))
    }
}
