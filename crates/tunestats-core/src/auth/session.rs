//! Encrypted client-side session blobs.
//!
//! The session carries the user's profile and credential, sealed with the
//! same codec as stored tokens so it can travel in a cookie.

use serde::{Deserialize, Serialize};

use super::CredentialRecord;
use crate::crypto::CryptoCodec;
use crate::error::Result;
use crate::models::UserInfo;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionPayload {
    pub user_info: UserInfo,
    pub credential: CredentialRecord,
}

#[derive(Debug, Clone)]
pub struct SessionCodec {
    codec: CryptoCodec,
}

impl SessionCodec {
    pub fn new(codec: CryptoCodec) -> Self {
        Self { codec }
    }

    pub fn encode_session(&self, payload: &SessionPayload) -> Result<String> {
        Ok(self.codec.seal_to_string(payload)?)
    }

    /// Fails with `Error::Decryption` on tampering or a key mismatch.
    pub fn decode_session(&self, blob: &str) -> Result<SessionPayload> {
        Ok(self.codec.open_str(blob)?)
    }
}

/// Receives the re-encoded session after a token refresh.
pub trait SessionSink: Send {
    fn replace(&mut self, encoded: String) -> anyhow::Result<()>;
}

/// For callers without a client session (background jobs, the CLI).
#[derive(Debug, Default, Clone, Copy)]
pub struct NoSession;

impl SessionSink for NoSession {
    fn replace(&mut self, _encoded: String) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Holds the latest encoded session in memory.
#[derive(Debug, Default, Clone)]
pub struct SessionSlot {
    encoded: Option<String>,
}

impl SessionSlot {
    pub fn new(encoded: Option<String>) -> Self {
        Self { encoded }
    }

    pub fn encoded(&self) -> Option<&str> {
        self.encoded.as_deref()
    }
}

impl SessionSink for SessionSlot {
    fn replace(&mut self, encoded: String) -> anyhow::Result<()> {
        self.encoded = Some(encoded);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::test_support::user_info;
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
    use chrono::Utc;

    fn codec() -> SessionCodec {
        SessionCodec::new(CryptoCodec::new(&[9u8; 32]).unwrap())
    }

    fn payload() -> SessionPayload {
        SessionPayload {
            user_info: user_info("alice"),
            credential: CredentialRecord {
                user_id: "alice".into(),
                access_token: "access".into(),
                refresh_token: "refresh".into(),
                expires_at: Utc::now(),
                scope: None,
            },
        }
    }

    #[test]
    fn test_session_round_trip() {
        let codec = codec();
        let payload = payload();
        let blob = codec.encode_session(&payload).unwrap();
        assert!(!blob.contains("refresh"));
        assert_eq!(codec.decode_session(&blob).unwrap(), payload);
    }

    #[test]
    fn test_corrupted_session_fails_decryption() {
        let codec = codec();
        let blob = codec.encode_session(&payload()).unwrap();

        let mut bytes = URL_SAFE_NO_PAD.decode(&blob).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;
        let tampered = URL_SAFE_NO_PAD.encode(bytes);

        assert!(matches!(codec.decode_session(&tampered), Err(Error::Decryption)));
        assert!(matches!(codec.decode_session("not a session"), Err(Error::Decryption)));
    }

    #[test]
    fn test_other_key_cannot_decode() {
        let blob = codec().encode_session(&payload()).unwrap();
        let other = SessionCodec::new(CryptoCodec::new(&[1u8; 32]).unwrap());
        assert!(matches!(other.decode_session(&blob), Err(Error::Decryption)));
    }

    #[test]
    fn test_session_slot_replaces() {
        let mut slot = SessionSlot::default();
        assert!(slot.encoded().is_none());
        slot.replace("blob".into()).unwrap();
        assert_eq!(slot.encoded(), Some("blob"));
    }
}
