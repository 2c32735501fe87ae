use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Authorizer, UpstreamError};

/// Token endpoint of the accounts service
const TOKEN_URL: &str = "https://accounts.spotify.com/api/token";

/// HTTP request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Successful response from the token endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    /// Lifetime in seconds.
    pub expires_in: i64,
    /// Present when the server rotates the refresh token.
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

impl TokenGrant {
    /// Absolute expiry of a grant issued at `issued_at`.
    ///
    /// A lifetime outside the representable range is an invalid response.
    pub fn expires_at(&self, issued_at: DateTime<Utc>) -> Result<DateTime<Utc>, UpstreamError> {
        chrono::Duration::try_seconds(self.expires_in)
            .and_then(|lifetime| issued_at.checked_add_signed(lifetime))
            .ok_or_else(|| {
                UpstreamError::InvalidResponse(format!(
                    "expires_in out of range: {}",
                    self.expires_in
                ))
            })
    }
}

#[derive(Debug, Deserialize)]
struct OAuthErrorBody {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Client-credential authenticated access to the token endpoint.
#[derive(Clone)]
pub struct SpotifyAccounts {
    client: Client,
    token_url: String,
    client_id: String,
    client_secret: String,
}

impl SpotifyAccounts {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Result<Self, UpstreamError> {
        Self::with_token_url(TOKEN_URL, client_id, client_secret)
    }

    pub fn with_token_url(
        token_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Result<Self, UpstreamError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            token_url: token_url.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        })
    }
}

#[async_trait]
impl Authorizer for SpotifyAccounts {
    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, UpstreamError> {
        let response = self
            .client
            .post(&self.token_url)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
            ])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if status.is_success() {
            debug!("Refresh token exchanged");
            return serde_json::from_str(&body)
                .map_err(|e| UpstreamError::InvalidResponse(format!("token response: {}", e)));
        }

        if matches!(status, StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED) {
            if let Ok(err) = serde_json::from_str::<OAuthErrorBody>(&body) {
                if err.error == "invalid_grant" {
                    return Err(UpstreamError::InvalidGrant(
                        err.error_description.unwrap_or(err.error),
                    ));
                }
            }
        }

        Err(UpstreamError::from_status(status, &body))
    }
}
