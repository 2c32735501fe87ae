use std::fmt;

use serde::{Deserialize, Serialize};

/// Affinity window for top-item queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeWindow {
    /// Roughly the last four weeks.
    ShortTerm,
    /// Roughly the last six months.
    MediumTerm,
    /// Several years of history.
    LongTerm,
}

impl TimeWindow {
    pub const ALL: [TimeWindow; 3] = [
        TimeWindow::ShortTerm,
        TimeWindow::MediumTerm,
        TimeWindow::LongTerm,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TimeWindow::ShortTerm => "short_term",
            TimeWindow::MediumTerm => "medium_term",
            TimeWindow::LongTerm => "long_term",
        }
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Paging<T> {
    pub items: Vec<T>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExternalUrls {
    #[serde(default)]
    pub spotify: String,
}

/// One size variant of an image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawImage {
    pub url: String,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Followers {
    #[serde(default)]
    pub total: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawArtistRef {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawAlbum {
    pub name: String,
    #[serde(default)]
    pub images: Vec<RawImage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawTrack {
    /// Null for local files.
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub artists: Vec<RawArtistRef>,
    pub album: RawAlbum,
    #[serde(default)]
    pub external_urls: ExternalUrls,
}

impl RawTrack {
    /// Name of the first credited artist, or empty.
    pub fn primary_artist(&self) -> &str {
        self.artists.first().map(|a| a.name.as_str()).unwrap_or("")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawArtist {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub images: Vec<RawImage>,
    #[serde(default)]
    pub followers: Followers,
    #[serde(default)]
    pub external_urls: ExternalUrls,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawPlaylist {
    pub id: String,
    pub name: String,
    /// Null when the owner has not chosen a visibility.
    #[serde(default)]
    pub public: Option<bool>,
    /// The API returns null for playlists without artwork.
    #[serde(default)]
    pub images: Option<Vec<RawImage>>,
    #[serde(default)]
    pub external_urls: ExternalUrls,
    #[serde(default)]
    pub owner: Option<PlaylistOwner>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PlaylistOwner {
    pub id: String,
}

/// One entry of the recently-played history.
#[derive(Debug, Clone, Deserialize)]
pub struct PlayHistory {
    pub track: RawTrack,
    pub played_at: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct CurrentlyPlayingResponse {
    #[serde(default)]
    pub item: Option<RawTrack>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct PlaylistDetail {
    #[serde(default)]
    pub followers: Followers,
}

/// Body returned by playlist item additions.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct PlaylistSnapshot {
    pub snapshot_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_track() {
        let json = r#"{
            "id": "4uLU6hMCjMI75M1A2tKUQC",
            "name": "Never Gonna Give You Up",
            "artists": [{"id": "0gxyHStUsqpMadRV0Di1Qt", "name": "Rick Astley"}],
            "album": {
                "name": "Whenever You Need Somebody",
                "images": [
                    {"url": "https://i.scdn.co/image/large", "width": 640, "height": 640},
                    {"url": "https://i.scdn.co/image/small", "width": 64, "height": 64}
                ]
            },
            "external_urls": {"spotify": "https://open.spotify.com/track/4uLU6hMCjMI75M1A2tKUQC"}
        }"#;

        let track: RawTrack = serde_json::from_str(json).expect("Failed to parse track JSON");
        assert_eq!(track.primary_artist(), "Rick Astley");
        assert_eq!(track.album.images.len(), 2);
        assert_eq!(track.album.images[0].width, Some(640));
    }

    #[test]
    fn test_parse_local_track_without_id() {
        let json = r#"{"id": null, "name": "demo.mp3", "artists": [], "album": {"name": ""}}"#;
        let track: RawTrack = serde_json::from_str(json).unwrap();
        assert!(track.id.is_none());
        assert_eq!(track.primary_artist(), "");
        assert_eq!(track.external_urls.spotify, "");
    }

    #[test]
    fn test_parse_playlist_with_null_images() {
        let json = r#"{"id": "p1", "name": "Mix", "public": null, "images": null}"#;
        let playlist: RawPlaylist = serde_json::from_str(json).unwrap();
        assert!(playlist.public.is_none());
        assert!(playlist.images.is_none());
        assert!(playlist.owner.is_none());
    }

    #[test]
    fn test_parse_playlist_owner() {
        let json = r#"{"id": "p1", "name": "Mix", "owner": {"id": "alice", "display_name": "A"}}"#;
        let playlist: RawPlaylist = serde_json::from_str(json).unwrap();
        assert_eq!(playlist.owner.unwrap().id, "alice");
    }

    #[test]
    fn test_time_window_names() {
        assert_eq!(TimeWindow::ShortTerm.to_string(), "short_term");
        assert_eq!(
            serde_json::to_string(&TimeWindow::LongTerm).unwrap(),
            "\"long_term\""
        );
    }
}
