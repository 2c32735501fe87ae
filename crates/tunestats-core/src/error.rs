use thiserror::Error;

use crate::cache::ResourceKind;
use crate::crypto::CryptoError;
use crate::store::StoreError;
use crate::upstream::UpstreamError;

/// Errors surfaced at the request-handler boundary.
///
/// Cache misses and stale reads are not errors; they are handled inside the
/// orchestrator and never reach this type.
#[derive(Error, Debug)]
pub enum Error {
    /// Tampered blob or key mismatch. The session or credential is unusable
    /// and the user must authorize again.
    #[error("Decryption failed - session or credential must be re-established")]
    Decryption,

    /// Transient; retry at the caller's discretion.
    #[error("Store error: {0}")]
    StoreUnavailable(#[from] StoreError),

    /// Transient; already past any stale fallback.
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(#[from] UpstreamError),

    /// Terminal for this credential; only a new authorization resolves it.
    #[error("Credential for user {user_id} is invalid - authorization must be restarted")]
    CredentialInvalid { user_id: String },

    #[error("{0} is not a cached resource kind")]
    NotCacheable(ResourceKind),

    /// Rejected before any upstream call.
    #[error("Not a track link: {0}")]
    InvalidTrackUrl(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<CryptoError> for Error {
    fn from(e: CryptoError) -> Self {
        match e {
            CryptoError::MissingKey | CryptoError::InvalidKey(_) => Error::Config(e.to_string()),
            CryptoError::Decryption | CryptoError::Serialization(_) => Error::Decryption,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crypto_errors_map_to_taxonomy() {
        assert!(matches!(Error::from(CryptoError::Decryption), Error::Decryption));
        assert!(matches!(Error::from(CryptoError::MissingKey), Error::Config(_)));
    }

    #[test]
    fn test_credential_invalid_display() {
        let err = Error::CredentialInvalid {
            user_id: "alice".into(),
        };
        assert_eq!(
            err.to_string(),
            "Credential for user alice is invalid - authorization must be restarted"
        );
    }
}
