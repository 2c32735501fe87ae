//! Canonical payloads cached per resource kind.
//!
//! List items carry a 1-based `number` in upstream order. These are the
//! shapes the web front end renders, so they can optionally export
//! TypeScript definitions with the `ts` feature.

use serde::{Deserialize, Serialize};

#[cfg(feature = "ts")]
use ts_rs::TS;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(TS), ts(export))]
pub struct TrackEntry {
    pub number: u32,
    pub track_name: String,
    pub artist_name: String,
    pub album_name: String,
    /// 640px album art, when the upstream offers that size.
    pub album_cover: Option<String>,
    pub track_id: String,
    pub track_url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(TS), ts(export))]
pub struct TopTracks {
    pub short_term: Vec<TrackEntry>,
    pub medium_term: Vec<TrackEntry>,
    pub long_term: Vec<TrackEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(TS), ts(export))]
pub struct ArtistEntry {
    pub number: u32,
    pub artist_name: String,
    pub artist_id: String,
    pub artist_url: String,
    pub artist_image: Option<String>,
    pub followers: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(TS), ts(export))]
pub struct TopArtists {
    pub short_term: Vec<ArtistEntry>,
    pub medium_term: Vec<ArtistEntry>,
    pub long_term: Vec<ArtistEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(TS), ts(export))]
pub struct GenreCount {
    pub name: String,
    pub count: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(TS), ts(export))]
pub struct TopGenres {
    /// Most frequent first.
    pub genres: Vec<GenreCount>,
}

impl TopGenres {
    /// The `n` most frequent genres.
    pub fn top(&self, n: usize) -> &[GenreCount] {
        &self.genres[..self.genres.len().min(n)]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(TS), ts(export))]
pub struct PlaylistEntry {
    pub number: u32,
    pub playlist_name: String,
    pub playlist_id: String,
    pub playlist_url: String,
    pub playlist_picture: Option<String>,
    pub playlist_like_count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(TS), ts(export))]
pub struct Playlists {
    pub playlists: Vec<PlaylistEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(TS), ts(export))]
pub struct RecentTrack {
    pub number: u32,
    pub track_id: String,
    pub track_name: String,
    pub artist_name: String,
    pub album_name: String,
    pub album_picture: Option<String>,
    pub track_url: String,
    /// ISO-8601 timestamp as reported upstream.
    pub datetime_played: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(TS), ts(export))]
pub struct RecentlyPlayed {
    pub tracks: Vec<RecentTrack>,
}

/// The track on the user's player right now.
///
/// The all-empty value (`CurrentlyPlaying::nothing()`) means nothing is playing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(TS), ts(export))]
pub struct CurrentlyPlaying {
    pub track_name: String,
    pub artist_name: String,
    pub album_name: String,
    pub album_cover: String,
    pub track_id: String,
    pub track_url: String,
}

impl CurrentlyPlaying {
    /// Sentinel for an idle player.
    pub fn nothing() -> Self {
        Self::default()
    }

    pub fn is_playing(&self) -> bool {
        !self.track_name.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nothing_playing_sentinel() {
        let idle = CurrentlyPlaying::nothing();
        assert!(!idle.is_playing());
        assert_eq!(idle.album_cover, "");

        let json = serde_json::to_value(&idle).unwrap();
        assert_eq!(json["track_name"], "");
        assert_eq!(json["track_url"], "");
    }

    #[test]
    fn test_top_genres_slice() {
        let genres = TopGenres {
            genres: vec![
                GenreCount { name: "indie".into(), count: 3 },
                GenreCount { name: "pop".into(), count: 1 },
            ],
        };
        assert_eq!(genres.top(1).len(), 1);
        assert_eq!(genres.top(10).len(), 2);
    }
}
