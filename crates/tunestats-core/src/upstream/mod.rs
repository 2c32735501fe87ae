//! Upstream Web API collaborators.
//!
//! The cache and token layers only see the `UpstreamFetcher` and `Authorizer`
//! traits, and player/playlist changes go through `UpstreamActions`.
//! `SpotifyClient` and `SpotifyAccounts` are the HTTP implementations; tests
//! substitute in-process fakes.

pub mod accounts;
pub mod client;
pub mod error;

use async_trait::async_trait;
use serde::Serialize;

use crate::models::{PlayHistory, RawArtist, RawPlaylist, RawTrack, TimeWindow, UserInfo};

pub use accounts::{SpotifyAccounts, TokenGrant};
pub use client::SpotifyClient;
pub use error::UpstreamError;

/// Read access to a user's listening data, authenticated by access token.
#[async_trait]
pub trait UpstreamFetcher: Send + Sync {
    async fn current_user(&self, access_token: &str) -> Result<UserInfo, UpstreamError>;

    async fn top_tracks(
        &self,
        access_token: &str,
        window: TimeWindow,
        limit: u32,
    ) -> Result<Vec<RawTrack>, UpstreamError>;

    async fn top_artists(
        &self,
        access_token: &str,
        window: TimeWindow,
        limit: u32,
    ) -> Result<Vec<RawArtist>, UpstreamError>;

    async fn playlists(&self, access_token: &str) -> Result<Vec<RawPlaylist>, UpstreamError>;

    async fn playlist_followers(
        &self,
        access_token: &str,
        playlist_id: &str,
    ) -> Result<u64, UpstreamError>;

    async fn recently_played(
        &self,
        access_token: &str,
        limit: u32,
    ) -> Result<Vec<PlayHistory>, UpstreamError>;

    /// `Ok(None)` when the player is idle.
    async fn currently_playing(&self, access_token: &str)
        -> Result<Option<RawTrack>, UpstreamError>;
}

/// Settings for a playlist created on the user's behalf.
#[derive(Debug, Clone, Serialize)]
pub struct NewPlaylist {
    pub name: String,
    pub public: bool,
    pub description: String,
}

/// Changes to a user's player queue and playlists.
#[async_trait]
pub trait UpstreamActions: UpstreamFetcher {
    /// `uri` is a `spotify:track:` URI.
    async fn add_to_queue(&self, access_token: &str, uri: &str) -> Result<(), UpstreamError>;

    async fn create_playlist(
        &self,
        access_token: &str,
        user_id: &str,
        playlist: &NewPlaylist,
    ) -> Result<RawPlaylist, UpstreamError>;

    /// Append tracks; returns the playlist's new snapshot id.
    async fn add_to_playlist(
        &self,
        access_token: &str,
        playlist_id: &str,
        uris: &[String],
    ) -> Result<String, UpstreamError>;
}

/// Exchanges refresh tokens at the authorization server.
#[async_trait]
pub trait Authorizer: Send + Sync {
    /// Returns `UpstreamError::InvalidGrant` when the refresh token is
    /// revoked or otherwise refused.
    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, UpstreamError>;
}
