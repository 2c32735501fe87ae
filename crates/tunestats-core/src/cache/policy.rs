use chrono::Duration;
use serde::{Deserialize, Serialize};

use super::ResourceKind;

/// Aggregates change slowly; four days between refreshes.
const AGGREGATE_TTL_SECS: u64 = 4 * 24 * 60 * 60;

const CURRENTLY_PLAYING_TTL_SECS: u64 = 60;

/// How old a currently-playing entry may be and still stand in for a
/// failed refresh.
const CURRENTLY_PLAYING_STALE_WINDOW_SECS: u64 = 60;

/// Per-kind TTLs, in seconds so they round-trip through config.json.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CachePolicy {
    pub top_tracks_ttl_secs: u64,
    pub top_artists_ttl_secs: u64,
    pub top_genres_ttl_secs: u64,
    pub playlists_ttl_secs: u64,
    pub recently_played_ttl_secs: u64,
    pub currently_playing_ttl_secs: u64,
    pub currently_playing_stale_window_secs: u64,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            top_tracks_ttl_secs: AGGREGATE_TTL_SECS,
            top_artists_ttl_secs: AGGREGATE_TTL_SECS,
            top_genres_ttl_secs: AGGREGATE_TTL_SECS,
            playlists_ttl_secs: AGGREGATE_TTL_SECS,
            recently_played_ttl_secs: AGGREGATE_TTL_SECS,
            currently_playing_ttl_secs: CURRENTLY_PLAYING_TTL_SECS,
            currently_playing_stale_window_secs: CURRENTLY_PLAYING_STALE_WINDOW_SECS,
        }
    }
}

impl CachePolicy {
    /// TTL for a kind. The token field is never served from cache.
    pub fn ttl(&self, kind: ResourceKind) -> Duration {
        let secs = match kind {
            ResourceKind::TopTracks => self.top_tracks_ttl_secs,
            ResourceKind::TopArtists => self.top_artists_ttl_secs,
            ResourceKind::TopGenres => self.top_genres_ttl_secs,
            ResourceKind::Playlists => self.playlists_ttl_secs,
            ResourceKind::RecentlyPlayed => self.recently_played_ttl_secs,
            ResourceKind::CurrentlyPlaying => self.currently_playing_ttl_secs,
            ResourceKind::Token => 0,
        };
        seconds(secs)
    }

    pub fn currently_playing_stale_window(&self) -> Duration {
        seconds(self.currently_playing_stale_window_secs)
    }

    pub fn with_ttl(mut self, kind: ResourceKind, ttl_secs: u64) -> Self {
        match kind {
            ResourceKind::TopTracks => self.top_tracks_ttl_secs = ttl_secs,
            ResourceKind::TopArtists => self.top_artists_ttl_secs = ttl_secs,
            ResourceKind::TopGenres => self.top_genres_ttl_secs = ttl_secs,
            ResourceKind::Playlists => self.playlists_ttl_secs = ttl_secs,
            ResourceKind::RecentlyPlayed => self.recently_played_ttl_secs = ttl_secs,
            ResourceKind::CurrentlyPlaying => self.currently_playing_ttl_secs = ttl_secs,
            ResourceKind::Token => {}
        }
        self
    }
}

/// Values beyond what `Duration` holds saturate, i.e. never expire.
fn seconds(secs: u64) -> Duration {
    i64::try_from(secs)
        .ok()
        .and_then(Duration::try_seconds)
        .unwrap_or(Duration::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_ttls() {
        let policy = CachePolicy::default();
        assert_eq!(policy.ttl(ResourceKind::TopTracks), Duration::days(4));
        assert_eq!(policy.ttl(ResourceKind::RecentlyPlayed), Duration::days(4));
        assert_eq!(policy.ttl(ResourceKind::CurrentlyPlaying), Duration::seconds(60));
        assert_eq!(policy.currently_playing_stale_window(), Duration::seconds(60));
        assert_eq!(policy.ttl(ResourceKind::Token), Duration::zero());
    }

    #[test]
    fn test_huge_ttl_saturates() {
        let policy: CachePolicy =
            serde_json::from_str(r#"{"playlists_ttl_secs": 100000000000000000}"#).unwrap();
        assert_eq!(policy.ttl(ResourceKind::Playlists), Duration::MAX);

        let policy = CachePolicy::default().with_ttl(ResourceKind::TopTracks, u64::MAX);
        assert_eq!(policy.ttl(ResourceKind::TopTracks), Duration::MAX);
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let policy: CachePolicy =
            serde_json::from_str(r#"{"playlists_ttl_secs": 3600}"#).unwrap();
        assert_eq!(policy.ttl(ResourceKind::Playlists), Duration::hours(1));
        assert_eq!(policy.ttl(ResourceKind::TopGenres), Duration::days(4));
    }

    #[test]
    fn test_with_ttl() {
        let policy = CachePolicy::default().with_ttl(ResourceKind::CurrentlyPlaying, 15);
        assert_eq!(policy.ttl(ResourceKind::CurrentlyPlaying), Duration::seconds(15));
    }
}
