//! Data models for upstream records and cached payloads.
//!
//! - `upstream`: records as the Web API returns them (`RawTrack`, `RawArtist`, ...)
//! - `resource`: canonical normalized payloads stored per resource kind
//! - `user`: the user profile snapshot carried in sessions

pub mod resource;
pub mod upstream;
pub mod user;

pub use resource::{
    ArtistEntry, CurrentlyPlaying, GenreCount, PlaylistEntry, Playlists, RecentTrack,
    RecentlyPlayed, TopArtists, TopGenres, TopTracks, TrackEntry,
};
pub use upstream::{
    ExternalUrls, Followers, Paging, PlayHistory, PlaylistOwner, RawAlbum, RawArtist, RawArtistRef,
    RawImage, RawPlaylist, RawTrack, TimeWindow,
};
pub use user::UserInfo;
