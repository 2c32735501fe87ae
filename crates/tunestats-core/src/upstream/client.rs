//! HTTP client for the Spotify Web API.
//!
//! This module provides `SpotifyClient`, the production `UpstreamFetcher`.
//! Requests are bearer-authenticated with the caller's access token and
//! retried with exponential backoff when rate limited.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::{NewPlaylist, UpstreamActions, UpstreamError, UpstreamFetcher};
use crate::models::upstream::{CurrentlyPlayingResponse, PlaylistDetail, PlaylistSnapshot};
use crate::models::{Paging, PlayHistory, RawArtist, RawPlaylist, RawTrack, TimeWindow, UserInfo};

// ============================================================================
// Constants
// ============================================================================

/// Base URL for Web API endpoints
const API_BASE_URL: &str = "https://api.spotify.com/v1";

/// HTTP request timeout in seconds.
/// A timed-out fetch surfaces as a network error, which the cache treats
/// like any other upstream outage.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

/// Page size for the playlist listing.
const PLAYLIST_PAGE_LIMIT: u32 = 50;

/// Upper bound on a server-requested `Retry-After` delay.
const MAX_RETRY_AFTER_SECS: u64 = 60;

/// Outcome of one request attempt.
enum Attempt {
    Done(reqwest::Response),
    RateLimited { retry_after: Option<Duration> },
}

/// Delay requested by a 429's `Retry-After` header, in whole seconds.
fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    let secs: u64 = headers.get(RETRY_AFTER)?.to_str().ok()?.trim().parse().ok()?;
    Some(Duration::from_secs(secs.min(MAX_RETRY_AFTER_SECS)))
}

/// Web API client.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct SpotifyClient {
    client: Client,
    base_url: String,
    initial_backoff: Duration,
}

impl SpotifyClient {
    /// Create a new client against the public API
    pub fn new() -> Result<Self, UpstreamError> {
        Self::with_base_url(API_BASE_URL)
    }

    /// Create a client against a different API root (used by tests)
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, UpstreamError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            initial_backoff: Duration::from_millis(INITIAL_BACKOFF_MS),
        })
    }

    /// Override the first rate-limit backoff delay
    pub fn with_initial_backoff(mut self, backoff: Duration) -> Self {
        self.initial_backoff = backoff;
        self
    }

    /// Check if response is successful, returning an error with body if not.
    /// A 429 becomes `Attempt::RateLimited` carrying the server's requested
    /// delay, if any; every other failure status is an error.
    async fn check_response_for_retry(
        response: reqwest::Response,
    ) -> Result<Attempt, UpstreamError> {
        if response.status().is_success() {
            Ok(Attempt::Done(response))
        } else if response.status() == StatusCode::TOO_MANY_REQUESTS {
            Ok(Attempt::RateLimited {
                retry_after: retry_after(response.headers()),
            })
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(UpstreamError::from_status(status, &body))
        }
    }

    /// Send a bearer-authenticated request, retrying on 429.
    async fn send(
        &self,
        access_token: &str,
        request: impl Fn() -> RequestBuilder,
    ) -> Result<reqwest::Response, UpstreamError> {
        let mut retries = 0;
        let mut backoff = self.initial_backoff;

        loop {
            let response = request().bearer_auth(access_token).send().await?;

            match Self::check_response_for_retry(response).await? {
                Attempt::Done(response) => return Ok(response),
                Attempt::RateLimited { retry_after } => {
                    retries += 1;
                    if retries > MAX_RATE_LIMIT_RETRIES {
                        return Err(UpstreamError::RateLimited);
                    }
                    let delay = retry_after.unwrap_or(backoff);
                    warn!(
                        retry = retries,
                        delay_ms = delay.as_millis() as u64,
                        "Rate limited, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    backoff *= 2;
                }
            }
        }
    }

    async fn get<T: DeserializeOwned>(
        &self,
        access_token: &str,
        url: &str,
    ) -> Result<T, UpstreamError> {
        let response = self.send(access_token, || self.client.get(url)).await?;
        Self::parse(response, url).await
    }

    async fn parse<T: DeserializeOwned>(
        response: reqwest::Response,
        url: &str,
    ) -> Result<T, UpstreamError> {
        let text = response.text().await?;
        serde_json::from_str(&text)
            .map_err(|e| UpstreamError::InvalidResponse(format!("{} from {}", e, url)))
    }
}

#[async_trait]
impl UpstreamFetcher for SpotifyClient {
    async fn current_user(&self, access_token: &str) -> Result<UserInfo, UpstreamError> {
        let url = format!("{}/me", self.base_url);
        self.get(access_token, &url).await
    }

    async fn top_tracks(
        &self,
        access_token: &str,
        window: TimeWindow,
        limit: u32,
    ) -> Result<Vec<RawTrack>, UpstreamError> {
        let url = format!(
            "{}/me/top/tracks?limit={}&offset=0&time_range={}",
            self.base_url, limit, window
        );
        let page: Paging<RawTrack> = self.get(access_token, &url).await?;
        debug!(%window, count = page.items.len(), "Fetched top tracks");
        Ok(page.items)
    }

    async fn top_artists(
        &self,
        access_token: &str,
        window: TimeWindow,
        limit: u32,
    ) -> Result<Vec<RawArtist>, UpstreamError> {
        let url = format!(
            "{}/me/top/artists?limit={}&offset=0&time_range={}",
            self.base_url, limit, window
        );
        let page: Paging<RawArtist> = self.get(access_token, &url).await?;
        debug!(%window, count = page.items.len(), "Fetched top artists");
        Ok(page.items)
    }

    async fn playlists(&self, access_token: &str) -> Result<Vec<RawPlaylist>, UpstreamError> {
        let url = format!("{}/me/playlists?limit={}", self.base_url, PLAYLIST_PAGE_LIMIT);
        let page: Paging<RawPlaylist> = self.get(access_token, &url).await?;
        Ok(page.items)
    }

    async fn playlist_followers(
        &self,
        access_token: &str,
        playlist_id: &str,
    ) -> Result<u64, UpstreamError> {
        let url = format!("{}/playlists/{}?fields=followers", self.base_url, playlist_id);
        let detail: PlaylistDetail = self.get(access_token, &url).await?;
        Ok(detail.followers.total)
    }

    async fn recently_played(
        &self,
        access_token: &str,
        limit: u32,
    ) -> Result<Vec<PlayHistory>, UpstreamError> {
        let url = format!("{}/me/player/recently-played?limit={}", self.base_url, limit);
        let page: Paging<PlayHistory> = self.get(access_token, &url).await?;
        Ok(page.items)
    }

    async fn currently_playing(
        &self,
        access_token: &str,
    ) -> Result<Option<RawTrack>, UpstreamError> {
        let url = format!("{}/me/player/currently-playing", self.base_url);
        let response = self.send(access_token, || self.client.get(&url)).await?;

        // 204 No Content means the player is idle
        if response.status() == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        let text = response.text().await?;
        if text.trim().is_empty() {
            return Ok(None);
        }
        let playing: CurrentlyPlayingResponse = serde_json::from_str(&text)
            .map_err(|e| UpstreamError::InvalidResponse(format!("{} from {}", e, url)))?;
        Ok(playing.item)
    }
}

#[async_trait]
impl UpstreamActions for SpotifyClient {
    async fn add_to_queue(&self, access_token: &str, uri: &str) -> Result<(), UpstreamError> {
        let url = format!("{}/me/player/queue", self.base_url);
        self.send(access_token, || self.client.post(&url).query(&[("uri", uri)]))
            .await?;
        Ok(())
    }

    async fn create_playlist(
        &self,
        access_token: &str,
        user_id: &str,
        playlist: &NewPlaylist,
    ) -> Result<RawPlaylist, UpstreamError> {
        let url = format!("{}/users/{}/playlists", self.base_url, user_id);
        let response = self
            .send(access_token, || self.client.post(&url).json(playlist))
            .await?;
        Self::parse(response, &url).await
    }

    async fn add_to_playlist(
        &self,
        access_token: &str,
        playlist_id: &str,
        uris: &[String],
    ) -> Result<String, UpstreamError> {
        let url = format!("{}/playlists/{}/tracks", self.base_url, playlist_id);
        let body = serde_json::json!({ "uris": uris });
        let response = self
            .send(access_token, || self.client.post(&url).json(&body))
            .await?;
        let snapshot: PlaylistSnapshot = Self::parse(response, &url).await?;
        debug!(playlist_id, count = uris.len(), "Added tracks to playlist");
        Ok(snapshot.snapshot_id)
    }
}
