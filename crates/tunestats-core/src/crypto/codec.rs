use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chacha20poly1305::aead::{Aead, AeadCore, KeyInit, OsRng};
use chacha20poly1305::{XChaCha20Poly1305, XNonce};
use rand::RngCore;
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

/// Key length in bytes for XChaCha20-Poly1305.
pub const KEY_LEN: usize = 32;

/// Nonce length in bytes, prepended to every ciphertext.
const NONCE_LEN: usize = 24;

#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("No encryption key configured - run `tunestats keygen` to provision one")]
    MissingKey,

    #[error("Invalid encryption key: {0}")]
    InvalidKey(String),

    #[error("Decryption failed - wrong key, truncated or tampered payload")]
    Decryption,

    #[error("Payload serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A decrypted payload.
///
/// Structured payloads round-trip as JSON. On decryption any plaintext
/// starting with `{` is treated as structured.
#[derive(Debug, Clone, PartialEq)]
pub enum Plaintext {
    Text(String),
    Structured(serde_json::Value),
}

impl Plaintext {
    fn into_bytes(self) -> Result<Vec<u8>, CryptoError> {
        match self {
            Plaintext::Text(text) => Ok(text.into_bytes()),
            Plaintext::Structured(value) => Ok(serde_json::to_vec(&value)?),
        }
    }

    fn from_bytes(bytes: Vec<u8>) -> Result<Self, CryptoError> {
        if bytes.first() == Some(&b'{') {
            return Ok(Plaintext::Structured(serde_json::from_slice(&bytes)?));
        }
        String::from_utf8(bytes)
            .map(Plaintext::Text)
            .map_err(|_| CryptoError::Decryption)
    }
}

impl From<&str> for Plaintext {
    fn from(text: &str) -> Self {
        Plaintext::Text(text.to_string())
    }
}

impl From<serde_json::Value> for Plaintext {
    fn from(value: serde_json::Value) -> Self {
        Plaintext::Structured(value)
    }
}

/// Authenticated encryption keyed by a single process-wide secret.
/// Clone is cheap enough to hand one copy to each service.
#[derive(Clone)]
pub struct CryptoCodec {
    cipher: XChaCha20Poly1305,
}

impl std::fmt::Debug for CryptoCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CryptoCodec").finish_non_exhaustive()
    }
}

impl CryptoCodec {
    /// Build a codec from raw key bytes.
    pub fn new(key: &[u8]) -> Result<Self, CryptoError> {
        let cipher = XChaCha20Poly1305::new_from_slice(key).map_err(|_| {
            CryptoError::InvalidKey(format!("expected {} bytes, got {}", KEY_LEN, key.len()))
        })?;
        Ok(Self { cipher })
    }

    /// Build a codec from a URL-safe base64 key as produced by `generate_key`.
    pub fn from_base64(encoded: &str) -> Result<Self, CryptoError> {
        let trimmed = encoded.trim().trim_matches('"').trim_end_matches('=');
        if trimmed.is_empty() {
            return Err(CryptoError::MissingKey);
        }
        let key = URL_SAFE_NO_PAD
            .decode(trimmed)
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        Self::new(&key)
    }

    /// Mint a fresh random key, URL-safe base64 encoded.
    ///
    /// Only the provisioning command calls this; services load keys from config.
    pub fn generate_key() -> String {
        let mut key = [0u8; KEY_LEN];
        rand::rngs::OsRng.fill_bytes(&mut key);
        URL_SAFE_NO_PAD.encode(key)
    }

    pub fn encrypt(&self, plaintext: impl Into<Plaintext>) -> Result<Vec<u8>, CryptoError> {
        let bytes = plaintext.into().into_bytes()?;
        self.encrypt_bytes(&bytes)
    }

    pub fn decrypt(&self, blob: &[u8]) -> Result<Plaintext, CryptoError> {
        Plaintext::from_bytes(self.decrypt_bytes(blob)?)
    }

    /// Serialize and encrypt a typed value.
    pub fn seal<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, CryptoError> {
        self.encrypt_bytes(&serde_json::to_vec(value)?)
    }

    /// Decrypt and deserialize a typed value.
    pub fn open<T: DeserializeOwned>(&self, blob: &[u8]) -> Result<T, CryptoError> {
        let bytes = self.decrypt_bytes(blob)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Like `seal`, but returns URL-safe base64 suitable for documents and cookies.
    pub fn seal_to_string<T: Serialize>(&self, value: &T) -> Result<String, CryptoError> {
        Ok(URL_SAFE_NO_PAD.encode(self.seal(value)?))
    }

    pub fn open_str<T: DeserializeOwned>(&self, encoded: &str) -> Result<T, CryptoError> {
        let blob = URL_SAFE_NO_PAD
            .decode(encoded.trim())
            .map_err(|_| CryptoError::Decryption)?;
        self.open(&blob)
    }

    fn encrypt_bytes(&self, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let nonce = XChaCha20Poly1305::generate_nonce(&mut OsRng);
        // Encryption only fails on absurd lengths; report it as a codec failure.
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext)
            .map_err(|_| CryptoError::Decryption)?;

        let mut blob = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        blob.extend_from_slice(&nonce);
        blob.extend_from_slice(&ciphertext);
        Ok(blob)
    }

    fn decrypt_bytes(&self, blob: &[u8]) -> Result<Vec<u8>, CryptoError> {
        if blob.len() <= NONCE_LEN {
            return Err(CryptoError::Decryption);
        }
        let (nonce, ciphertext) = blob.split_at(NONCE_LEN);
        self.cipher
            .decrypt(XNonce::from_slice(nonce), ciphertext)
            .map_err(|_| CryptoError::Decryption)
    }
}
