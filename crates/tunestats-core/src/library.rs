//! Player and playlist changes made on a user's behalf.
//!
//! Tracks arrive as share links (`https://open.spotify.com/track/<id>?si=..`)
//! or URIs and are resolved to a `TrackUri` before any upstream call.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use tracing::info;

use crate::error::{Error, Result};
use crate::models::RawPlaylist;
use crate::upstream::{NewPlaylist, UpstreamActions};

/// Name of the playlist that collects recommended tracks.
pub const RECOMMENDED_PLAYLIST_NAME: &str = "Recommended Tracks";

const RECOMMENDED_PLAYLIST_DESCRIPTION: &str = "Tracks recommended to you through tunestats";

const TRACK_URI_PREFIX: &str = "spotify:track:";

/// A track in `spotify:track:<id>` form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackUri(String);

impl TrackUri {
    pub fn id(&self) -> &str {
        &self.0[TRACK_URI_PREFIX.len()..]
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for TrackUri {
    type Err = Error;

    /// Accepts a URI or a share link. Query and fragment are ignored, and a
    /// locale segment before `track` (`/intl-de/track/..`) is allowed.
    fn from_str(s: &str) -> Result<Self> {
        let input = s.trim();
        let id = match input.strip_prefix(TRACK_URI_PREFIX) {
            Some(id) => id,
            None => {
                let path = input.split(&['?', '#'][..]).next().unwrap_or_default();
                path.split('/')
                    .skip_while(|segment| *segment != "track")
                    .nth(1)
                    .unwrap_or_default()
            }
        };

        if id.is_empty() || !id.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(Error::InvalidTrackUrl(input.to_string()));
        }
        Ok(Self(format!("{}{}", TRACK_URI_PREFIX, id)))
    }
}

impl fmt::Display for TrackUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Queue and playlist actions. `access_token` must already be valid.
pub struct LibraryActions {
    upstream: Arc<dyn UpstreamActions>,
}

impl LibraryActions {
    pub fn new(upstream: Arc<dyn UpstreamActions>) -> Self {
        Self { upstream }
    }

    /// Add a track to the user's playback queue.
    pub async fn queue_track(&self, access_token: &str, track: &str) -> Result<TrackUri> {
        let uri: TrackUri = track.parse()?;
        self.upstream.add_to_queue(access_token, uri.as_str()).await?;
        info!(uri = %uri, "Track queued");
        Ok(uri)
    }

    /// The user's own recommendations playlist, created private on first use.
    pub async fn recommended_playlist(&self, access_token: &str) -> Result<RawPlaylist> {
        let user = self.upstream.current_user(access_token).await?;

        let existing = self
            .upstream
            .playlists(access_token)
            .await?
            .into_iter()
            .find(|playlist| {
                playlist.name == RECOMMENDED_PLAYLIST_NAME
                    && playlist.owner.as_ref().map_or(true, |owner| owner.id == user.id)
            });
        if let Some(playlist) = existing {
            return Ok(playlist);
        }

        let playlist = self
            .upstream
            .create_playlist(
                access_token,
                &user.id,
                &NewPlaylist {
                    name: RECOMMENDED_PLAYLIST_NAME.to_string(),
                    public: false,
                    description: RECOMMENDED_PLAYLIST_DESCRIPTION.to_string(),
                },
            )
            .await?;
        info!(user_id = %user.id, playlist_id = %playlist.id, "Created recommendations playlist");
        Ok(playlist)
    }

    /// Append a track to the recommendations playlist. Returns the new
    /// playlist snapshot id.
    pub async fn add_to_recommended(&self, access_token: &str, track: &str) -> Result<String> {
        let uri: TrackUri = track.parse()?;
        let playlist = self.recommended_playlist(access_token).await?;
        let snapshot = self
            .upstream
            .add_to_playlist(access_token, &playlist.id, &[uri.to_string()])
            .await?;
        info!(uri = %uri, playlist_id = %playlist.id, "Track added to recommendations");
        Ok(snapshot)
    }
}
