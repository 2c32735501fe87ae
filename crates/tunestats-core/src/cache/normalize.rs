//! Reduce raw upstream responses to the cached payload shapes.

use std::collections::HashMap;

use crate::models::{
    ArtistEntry, CurrentlyPlaying, GenreCount, PlayHistory, PlaylistEntry, RawArtist, RawImage,
    RawPlaylist, RawTrack, RecentTrack, TrackEntry,
};

/// Preferred artwork width.
pub const IMAGE_WIDTH: u32 = 640;

/// URL of the variant exactly `width` pixels wide.
pub fn select_image(images: &[RawImage], width: u32) -> Option<String> {
    images
        .iter()
        .find(|image| image.width == Some(width))
        .map(|image| image.url.clone())
}

/// URL of the first (largest) variant.
pub fn first_image(images: &[RawImage]) -> Option<String> {
    images.first().map(|image| image.url.clone())
}

fn rank(index: usize) -> u32 {
    u32::try_from(index + 1).unwrap_or(u32::MAX)
}

pub fn rank_tracks(tracks: &[RawTrack]) -> Vec<TrackEntry> {
    tracks
        .iter()
        .enumerate()
        .map(|(i, track)| TrackEntry {
            number: rank(i),
            track_name: track.name.clone(),
            artist_name: track.primary_artist().to_string(),
            album_name: track.album.name.clone(),
            album_cover: select_image(&track.album.images, IMAGE_WIDTH),
            track_id: track.id.clone().unwrap_or_default(),
            track_url: track.external_urls.spotify.clone(),
        })
        .collect()
}

pub fn rank_artists(artists: &[RawArtist]) -> Vec<ArtistEntry> {
    artists
        .iter()
        .enumerate()
        .map(|(i, artist)| ArtistEntry {
            number: rank(i),
            artist_name: artist.name.clone(),
            artist_id: artist.id.clone(),
            artist_url: artist.external_urls.spotify.clone(),
            artist_image: select_image(&artist.images, IMAGE_WIDTH),
            followers: artist.followers.total,
        })
        .collect()
}

/// Count genre occurrences across artist samples, most frequent first.
///
/// An artist appearing in several windows counts once per appearance. Ties
/// keep first-seen order.
pub fn count_genres<'a>(artists: impl IntoIterator<Item = &'a RawArtist>) -> Vec<GenreCount> {
    let mut counts: HashMap<&str, u32> = HashMap::new();
    let mut order: Vec<&str> = Vec::new();

    for artist in artists {
        for genre in &artist.genres {
            let count = counts.entry(genre.as_str()).or_insert_with(|| {
                order.push(genre.as_str());
                0
            });
            *count += 1;
        }
    }

    let mut genres: Vec<GenreCount> = order
        .into_iter()
        .map(|name| GenreCount {
            name: name.to_string(),
            count: counts.get(name).copied().unwrap_or_default(),
        })
        .collect();
    // Stable sort keeps first-seen order among ties
    genres.sort_by(|a, b| b.count.cmp(&a.count));
    genres
}

/// Playlists explicitly marked public, in upstream order.
pub fn public_playlists(playlists: Vec<RawPlaylist>) -> Vec<RawPlaylist> {
    playlists
        .into_iter()
        .filter(|playlist| playlist.public == Some(true))
        .collect()
}

/// Pair public playlists with their follower counts (same order).
pub fn playlist_entries(playlists: &[RawPlaylist], followers: &[u64]) -> Vec<PlaylistEntry> {
    playlists
        .iter()
        .zip(followers)
        .enumerate()
        .map(|(i, (playlist, &followers))| PlaylistEntry {
            number: rank(i),
            playlist_name: playlist.name.clone(),
            playlist_id: playlist.id.clone(),
            playlist_url: playlist.external_urls.spotify.clone(),
            playlist_picture: playlist.images.as_deref().and_then(first_image),
            playlist_like_count: followers,
        })
        .collect()
}

pub fn recent_tracks(history: &[PlayHistory]) -> Vec<RecentTrack> {
    history
        .iter()
        .enumerate()
        .map(|(i, play)| RecentTrack {
            number: rank(i),
            track_id: play.track.id.clone().unwrap_or_default(),
            track_name: play.track.name.clone(),
            artist_name: play.track.primary_artist().to_string(),
            album_name: play.track.album.name.clone(),
            album_picture: first_image(&play.track.album.images),
            track_url: play.track.external_urls.spotify.clone(),
            datetime_played: play.played_at.clone(),
        })
        .collect()
}

/// The idle sentinel when nothing is playing.
pub fn now_playing(track: Option<&RawTrack>) -> CurrentlyPlaying {
    let Some(track) = track else {
        return CurrentlyPlaying::nothing();
    };

    CurrentlyPlaying {
        track_name: track.name.clone(),
        artist_name: track.primary_artist().to_string(),
        album_name: track.album.name.clone(),
        album_cover: select_image(&track.album.images, IMAGE_WIDTH).unwrap_or_default(),
        track_id: track.id.clone().unwrap_or_default(),
        track_url: track.external_urls.spotify.clone(),
    }
}
