//! Credential persistence and refresh.
//!
//! Credentials are sealed with `CryptoCodec` and kept in the reserved
//! `token` field of the user's document. `ensure_valid` runs before every
//! upstream-backed request and refreshes tokens that are expired or within
//! the refresh buffer.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use super::{CredentialRecord, CredentialState, SessionCodec, SessionPayload, SessionSink};
use crate::cache::ResourceStore;
use crate::crypto::CryptoCodec;
use crate::error::{Error, Result};
use crate::upstream::{Authorizer, TokenGrant, UpstreamFetcher};

pub struct TokenManager {
    store: ResourceStore,
    codec: CryptoCodec,
    sessions: SessionCodec,
    authorizer: Arc<dyn Authorizer>,
    upstream: Arc<dyn UpstreamFetcher>,
}

impl TokenManager {
    pub fn new(
        store: ResourceStore,
        codec: CryptoCodec,
        authorizer: Arc<dyn Authorizer>,
        upstream: Arc<dyn UpstreamFetcher>,
    ) -> Self {
        Self {
            store,
            sessions: SessionCodec::new(codec.clone()),
            codec,
            authorizer,
            upstream,
        }
    }

    pub fn sessions(&self) -> &SessionCodec {
        &self.sessions
    }

    /// Persist the credential from a completed authorization.
    pub async fn register(&self, user_id: &str, grant: &TokenGrant) -> Result<CredentialRecord> {
        let credential = CredentialRecord::from_grant(user_id, grant, Utc::now()).map_err(|e| {
            warn!(user_id, error = %e, "Authorization grant is unusable");
            Error::CredentialInvalid {
                user_id: user_id.to_string(),
            }
        })?;
        self.persist(&credential).await?;
        info!(user_id, "Credential registered");
        Ok(credential)
    }

    /// Load and decrypt the stored credential.
    ///
    /// A blob that no longer decrypts (rotated key, tampering) is reported
    /// as `CredentialInvalid` so the caller restarts authorization.
    pub async fn load(&self, user_id: &str) -> Result<Option<CredentialRecord>> {
        let Some(blob) = self.store.get_token(user_id).await? else {
            return Ok(None);
        };

        match self.codec.open_str::<CredentialRecord>(&blob) {
            Ok(credential) => Ok(Some(credential)),
            Err(e) => {
                warn!(user_id, error = %e, "Stored credential could not be decrypted");
                Err(Error::CredentialInvalid {
                    user_id: user_id.to_string(),
                })
            }
        }
    }

    /// Load the stored credential and make sure it is usable.
    pub async fn valid_credential(
        &self,
        user_id: &str,
        session: &mut dyn SessionSink,
    ) -> Result<CredentialRecord> {
        let credential = self.load(user_id).await?.ok_or_else(|| Error::CredentialInvalid {
            user_id: user_id.to_string(),
        })?;
        self.ensure_valid(&credential, session).await
    }

    /// Return a credential whose access token is usable right now.
    ///
    /// A valid credential is returned unchanged without touching upstream.
    /// Otherwise the refresh token is exchanged, the new credential is
    /// sealed and stored, and a fresh session is handed to `session`.
    /// Session failures are logged and do not fail the call. A store failure
    /// surfaces as `StoreUnavailable` after the session write was attempted.
    pub async fn ensure_valid(
        &self,
        credential: &CredentialRecord,
        session: &mut dyn SessionSink,
    ) -> Result<CredentialRecord> {
        let user_id = credential.user_id.as_str();
        let now = Utc::now();

        if credential.state(now) == CredentialState::Valid {
            debug!(user_id, "Access token still valid");
            return Ok(credential.clone());
        }

        info!(
            user_id,
            expires_at = %credential.expires_at,
            state = ?CredentialState::Refreshing,
            "Access token expired, refreshing"
        );

        let grant = match self.authorizer.refresh(&credential.refresh_token).await {
            Ok(grant) => grant,
            Err(e) if e.is_rejected_grant() => {
                warn!(
                    user_id,
                    state = ?CredentialState::Invalid,
                    error = %e,
                    "Refresh token rejected"
                );
                return Err(Error::CredentialInvalid {
                    user_id: user_id.to_string(),
                });
            }
            Err(e) => {
                warn!(user_id, error = %e, "Token refresh failed");
                return Err(Error::UpstreamUnavailable(e));
            }
        };

        let refreshed = credential.refreshed(&grant, now).map_err(|e| {
            warn!(user_id, error = %e, "Refresh grant is unusable");
            Error::UpstreamUnavailable(e)
        })?;
        if refreshed.refresh_token != credential.refresh_token {
            debug!(user_id, "Refresh token rotated");
        }

        let persisted = self.persist(&refreshed).await;
        if let Err(e) = &persisted {
            error!(user_id, error = %e, "Failed to store refreshed credential");
        }

        if let Err(e) = self.propagate(&refreshed, session).await {
            warn!(user_id, error = %e, "Failed to update session after refresh");
        }

        persisted?;
        info!(user_id, expires_at = %refreshed.expires_at, "Access token refreshed");
        Ok(refreshed)
    }

    async fn persist(&self, credential: &CredentialRecord) -> Result<()> {
        let blob = self.codec.seal_to_string(credential)?;
        self.store.put_token(&credential.user_id, blob).await?;
        Ok(())
    }

    /// Re-encode the session with the new credential and a current profile.
    async fn propagate(
        &self,
        credential: &CredentialRecord,
        session: &mut dyn SessionSink,
    ) -> anyhow::Result<()> {
        let user_info = self.upstream.current_user(&credential.access_token).await?;
        let encoded = self.sessions.encode_session(&SessionPayload {
            user_info,
            credential: credential.clone(),
        })?;
        session.replace(encoded)
    }
}
