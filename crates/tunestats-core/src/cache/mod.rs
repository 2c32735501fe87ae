//! Per-user resource cache with TTL freshness and stale fallback.
//!
//! This module provides:
//! - `ResourceStore`: typed (user, resource kind) repository over a `DocumentStore`
//! - `CacheOrchestrator`: fetch-vs-reuse decisions and write-back
//! - `CachePolicy`: per-kind TTLs (4 days for aggregates, 60s for now playing)
//!
//! Reads classify entries as `Lookup::Fresh`, `Lookup::Stale` or
//! `Lookup::Absent`; expiry is a normal branch, never an error.

pub mod normalize;
pub mod orchestrator;
pub mod policy;
pub mod stats;
pub mod store;

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::models::{CurrentlyPlaying, Playlists, RecentlyPlayed, TopArtists, TopGenres, TopTracks};

pub use orchestrator::CacheOrchestrator;
pub use policy::CachePolicy;
pub use stats::{CacheStats, CacheStatsSnapshot};
pub use store::ResourceStore;

/// Category of per-user data stored in its own document field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    TopTracks,
    TopArtists,
    TopGenres,
    Playlists,
    RecentlyPlayed,
    CurrentlyPlaying,
    /// Reserved for the encrypted credential.
    Token,
}

impl ResourceKind {
    /// Every kind served through the cache (everything but `Token`).
    pub const CACHED: [ResourceKind; 6] = [
        ResourceKind::TopTracks,
        ResourceKind::TopArtists,
        ResourceKind::TopGenres,
        ResourceKind::Playlists,
        ResourceKind::RecentlyPlayed,
        ResourceKind::CurrentlyPlaying,
    ];

    /// Document field holding this kind.
    pub fn field(&self) -> &'static str {
        match self {
            ResourceKind::TopTracks => "top_tracks",
            ResourceKind::TopArtists => "top_artists",
            ResourceKind::TopGenres => "top_genres",
            ResourceKind::Playlists => "playlists",
            ResourceKind::RecentlyPlayed => "recently_played",
            ResourceKind::CurrentlyPlaying => "currently_playing",
            ResourceKind::Token => "token",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.field())
    }
}

impl FromStr for ResourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        ResourceKind::CACHED
            .into_iter()
            .chain([ResourceKind::Token])
            .find(|kind| kind.field() == normalized)
            .ok_or_else(|| format!("unknown resource kind: {}", s))
    }
}

/// A payload type cached under a fixed resource kind.
pub trait Resource: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const KIND: ResourceKind;

    fn into_payload(self) -> ResourcePayload;
}

macro_rules! impl_resource {
    ($ty:ident, $kind:ident) => {
        impl Resource for $ty {
            const KIND: ResourceKind = ResourceKind::$kind;

            fn into_payload(self) -> ResourcePayload {
                ResourcePayload::$kind(self)
            }
        }
    };
}

impl_resource!(TopTracks, TopTracks);
impl_resource!(TopArtists, TopArtists);
impl_resource!(TopGenres, TopGenres);
impl_resource!(Playlists, Playlists);
impl_resource!(RecentlyPlayed, RecentlyPlayed);
impl_resource!(CurrentlyPlaying, CurrentlyPlaying);

/// Any cached payload, for callers that dispatch on `ResourceKind`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ResourcePayload {
    TopTracks(TopTracks),
    TopArtists(TopArtists),
    TopGenres(TopGenres),
    Playlists(Playlists),
    RecentlyPlayed(RecentlyPlayed),
    CurrentlyPlaying(CurrentlyPlaying),
}

/// One cached value for a (user, kind) key.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry<T> {
    pub user_id: String,
    pub kind: ResourceKind,
    pub payload: T,
    pub refreshed_at: DateTime<Utc>,
}

impl<T> CacheEntry<T> {
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.refreshed_at
    }

    /// Fresh while strictly younger than `ttl`. Entries stamped in the future
    /// (clock skew) count as fresh.
    pub fn is_fresh(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        self.age(now) < ttl
    }
}

/// Human-readable age: "just now", "5m ago", "3h ago", "2d ago".
pub fn age_display(age: Duration) -> String {
    let minutes = age.num_minutes();
    if minutes < 1 {
        // Covers clock skew as well
        "just now".to_string()
    } else if minutes < 60 {
        format!("{}m ago", minutes)
    } else if minutes < 1440 {
        let hours = minutes / 60;
        let remaining_mins = minutes % 60;
        if remaining_mins >= 30 {
            format!("{}h ago", hours + 1)
        } else {
            format!("{}h ago", hours)
        }
    } else {
        let days = minutes / 1440;
        let remaining_hours = (minutes % 1440) / 60;
        if remaining_hours >= 12 {
            format!("{}d ago", days + 1)
        } else {
            format!("{}d ago", days)
        }
    }
}

/// Result of reading a key and checking it against its TTL.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup<T> {
    Fresh(CacheEntry<T>),
    Stale(CacheEntry<T>),
    Absent,
}

impl<T> Lookup<T> {
    pub fn classify(entry: Option<CacheEntry<T>>, ttl: Duration, now: DateTime<Utc>) -> Self {
        match entry {
            Some(entry) if entry.is_fresh(ttl, now) => Lookup::Fresh(entry),
            Some(entry) => Lookup::Stale(entry),
            None => Lookup::Absent,
        }
    }
}

/// Where a served payload came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    /// Fresh cache hit.
    Cache,
    /// Just fetched and written back.
    Upstream,
    /// Expired cache served because the refresh failed.
    StaleFallback,
    /// "Nothing playing" reported without an observation (upstream failed).
    Placeholder,
}

/// A payload handed to the request layer.
#[derive(Debug, Clone, PartialEq)]
pub struct Served<T> {
    pub payload: T,
    pub refreshed_at: DateTime<Utc>,
    pub origin: Origin,
}

impl<T> Served<T> {
    pub(crate) fn from_entry(entry: CacheEntry<T>, origin: Origin) -> Self {
        Self {
            payload: entry.payload,
            refreshed_at: entry.refreshed_at,
            origin,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Served<U> {
        Served {
            payload: f(self.payload),
            refreshed_at: self.refreshed_at,
            origin: self.origin,
        }
    }

    pub fn is_stale_fallback(&self) -> bool {
        self.origin == Origin::StaleFallback
    }
}
