use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::upstream::{TokenGrant, UpstreamError};

/// Buffer time before token expiry to trigger a refresh (60 seconds).
/// Tokens this close to expiry are refreshed to avoid mid-request
/// expiration during slow fan-out fetches.
pub const TOKEN_REFRESH_BUFFER_SECS: i64 = 60;

/// Lifecycle of a credential as seen by `TokenManager`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialState {
    Valid,
    Expired,
    /// A refresh exchange is in flight.
    Refreshing,
    /// The refresh token was refused; only a new authorization recovers.
    Invalid,
}

/// A user's upstream authorization.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialRecord {
    pub user_id: String,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub scope: Option<String>,
}

impl fmt::Debug for CredentialRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialRecord")
            .field("user_id", &self.user_id)
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .field("scope", &self.scope)
            .finish()
    }
}

impl CredentialRecord {
    /// Build a record from an initial grant. Fails if the grant carries no
    /// refresh token or an unrepresentable lifetime.
    pub fn from_grant(
        user_id: &str,
        grant: &TokenGrant,
        issued_at: DateTime<Utc>,
    ) -> Result<Self, UpstreamError> {
        let refresh_token = grant.refresh_token.clone().ok_or_else(|| {
            UpstreamError::InvalidResponse("grant has no refresh token".to_string())
        })?;
        Ok(Self {
            user_id: user_id.to_string(),
            access_token: grant.access_token.clone(),
            refresh_token,
            expires_at: grant.expires_at(issued_at)?,
            scope: grant.scope.clone(),
        })
    }

    /// Valid while more than the refresh buffer remains before expiry.
    pub fn state(&self, now: DateTime<Utc>) -> CredentialState {
        if now + Duration::seconds(TOKEN_REFRESH_BUFFER_SECS) < self.expires_at {
            CredentialState::Valid
        } else {
            CredentialState::Expired
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.state(now) == CredentialState::Expired
    }

    /// Apply a refresh grant. The refresh token is kept unless the grant
    /// rotates it.
    pub fn refreshed(
        &self,
        grant: &TokenGrant,
        issued_at: DateTime<Utc>,
    ) -> Result<Self, UpstreamError> {
        Ok(Self {
            user_id: self.user_id.clone(),
            access_token: grant.access_token.clone(),
            refresh_token: grant
                .refresh_token
                .clone()
                .unwrap_or_else(|| self.refresh_token.clone()),
            expires_at: grant.expires_at(issued_at)?,
            scope: grant.scope.clone().or_else(|| self.scope.clone()),
        })
    }
}
