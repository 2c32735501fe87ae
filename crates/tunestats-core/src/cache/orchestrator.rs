//! Decides per request whether to serve cached data or refresh from upstream.
//!
//! Rules, for every aggregate kind:
//! - fresh entry: serve it, no upstream call
//! - stale or absent: fetch, normalize, write back, serve
//! - fetch failed with a stale entry in hand: serve the stale entry
//! - fetch failed with nothing cached: `Error::UpstreamUnavailable`
//!
//! Currently-playing differs on failure: a prior observation is only reused
//! inside the stale window, otherwise the idle sentinel is reported.

use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::{debug, error, warn};

use super::normalize;
use super::{
    CacheEntry, CachePolicy, CacheStats, Lookup, Origin, Resource, ResourceKind, ResourcePayload,
    ResourceStore, Served,
};
use crate::error::{Error, Result};
use crate::models::{
    CurrentlyPlaying, Playlists, RecentlyPlayed, TimeWindow, TopArtists, TopGenres, TopTracks,
};
use crate::upstream::{UpstreamError, UpstreamFetcher};

// ============================================================================
// Constants
// ============================================================================

/// Items kept per time window for top tracks and artists.
const TOP_ITEMS_LIMIT: u32 = 10;

/// Artists sampled per window when counting genres.
const GENRE_SAMPLE_LIMIT: u32 = 50;

const RECENTLY_PLAYED_LIMIT: u32 = 50;

/// Maximum number of concurrent follower lookups per playlist refresh.
const MAX_CONCURRENT_REQUESTS: usize = 5;

pub struct CacheOrchestrator {
    store: ResourceStore,
    upstream: Arc<dyn UpstreamFetcher>,
    policy: CachePolicy,
    stats: CacheStats,
}

impl CacheOrchestrator {
    pub fn new(
        store: ResourceStore,
        upstream: Arc<dyn UpstreamFetcher>,
        policy: CachePolicy,
    ) -> Self {
        Self {
            store,
            upstream,
            policy,
            stats: CacheStats::default(),
        }
    }

    pub fn policy(&self) -> &CachePolicy {
        &self.policy
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    pub fn store(&self) -> &ResourceStore {
        &self.store
    }

    /// Serve any cached kind. `access_token` must already be valid.
    pub async fn get_or_refresh(
        &self,
        user_id: &str,
        kind: ResourceKind,
        access_token: &str,
    ) -> Result<Served<ResourcePayload>> {
        let served = match kind {
            ResourceKind::TopTracks => self
                .top_tracks(user_id, access_token)
                .await?
                .map(Resource::into_payload),
            ResourceKind::TopArtists => self
                .top_artists(user_id, access_token)
                .await?
                .map(Resource::into_payload),
            ResourceKind::TopGenres => self
                .top_genres(user_id, access_token)
                .await?
                .map(Resource::into_payload),
            ResourceKind::Playlists => self
                .playlists(user_id, access_token)
                .await?
                .map(Resource::into_payload),
            ResourceKind::RecentlyPlayed => self
                .recently_played(user_id, access_token)
                .await?
                .map(Resource::into_payload),
            ResourceKind::CurrentlyPlaying => self
                .currently_playing(user_id, access_token)
                .await?
                .map(Resource::into_payload),
            ResourceKind::Token => return Err(Error::NotCacheable(kind)),
        };
        Ok(served)
    }

    pub async fn top_tracks(&self, user_id: &str, access_token: &str) -> Result<Served<TopTracks>> {
        let upstream = &self.upstream;
        self.serve(user_id, async move {
            let (short, medium, long) = futures::try_join!(
                upstream.top_tracks(access_token, TimeWindow::ShortTerm, TOP_ITEMS_LIMIT),
                upstream.top_tracks(access_token, TimeWindow::MediumTerm, TOP_ITEMS_LIMIT),
                upstream.top_tracks(access_token, TimeWindow::LongTerm, TOP_ITEMS_LIMIT),
            )?;
            Ok::<_, UpstreamError>(TopTracks {
                short_term: normalize::rank_tracks(&short),
                medium_term: normalize::rank_tracks(&medium),
                long_term: normalize::rank_tracks(&long),
            })
        })
        .await
    }

    pub async fn top_artists(
        &self,
        user_id: &str,
        access_token: &str,
    ) -> Result<Served<TopArtists>> {
        let upstream = &self.upstream;
        self.serve(user_id, async move {
            let (short, medium, long) = futures::try_join!(
                upstream.top_artists(access_token, TimeWindow::ShortTerm, TOP_ITEMS_LIMIT),
                upstream.top_artists(access_token, TimeWindow::MediumTerm, TOP_ITEMS_LIMIT),
                upstream.top_artists(access_token, TimeWindow::LongTerm, TOP_ITEMS_LIMIT),
            )?;
            Ok::<_, UpstreamError>(TopArtists {
                short_term: normalize::rank_artists(&short),
                medium_term: normalize::rank_artists(&medium),
                long_term: normalize::rank_artists(&long),
            })
        })
        .await
    }

    pub async fn top_genres(&self, user_id: &str, access_token: &str) -> Result<Served<TopGenres>> {
        let upstream = &self.upstream;
        self.serve(user_id, async move {
            let (short, medium, long) = futures::try_join!(
                upstream.top_artists(access_token, TimeWindow::ShortTerm, GENRE_SAMPLE_LIMIT),
                upstream.top_artists(access_token, TimeWindow::MediumTerm, GENRE_SAMPLE_LIMIT),
                upstream.top_artists(access_token, TimeWindow::LongTerm, GENRE_SAMPLE_LIMIT),
            )?;
            Ok::<_, UpstreamError>(TopGenres {
                genres: normalize::count_genres(short.iter().chain(&medium).chain(&long)),
            })
        })
        .await
    }

    pub async fn playlists(&self, user_id: &str, access_token: &str) -> Result<Served<Playlists>> {
        let upstream = &self.upstream;
        self.serve(user_id, async move {
            let public = normalize::public_playlists(upstream.playlists(access_token).await?);

            // Bounded fan-out; buffered() keeps results in playlist order
            let followers: Vec<u64> = stream::iter(&public)
                .map(|playlist| upstream.playlist_followers(access_token, &playlist.id))
                .buffered(MAX_CONCURRENT_REQUESTS)
                .try_collect()
                .await?;

            Ok::<_, UpstreamError>(Playlists {
                playlists: normalize::playlist_entries(&public, &followers),
            })
        })
        .await
    }

    pub async fn recently_played(
        &self,
        user_id: &str,
        access_token: &str,
    ) -> Result<Served<RecentlyPlayed>> {
        let upstream = &self.upstream;
        self.serve(user_id, async move {
            let history = upstream
                .recently_played(access_token, RECENTLY_PLAYED_LIMIT)
                .await?;
            Ok::<_, UpstreamError>(RecentlyPlayed {
                tracks: normalize::recent_tracks(&history),
            })
        })
        .await
    }

    /// Like the aggregates, except on upstream failure: a prior observation
    /// is reused only while younger than the stale window, otherwise the
    /// idle sentinel is reported and nothing is written.
    pub async fn currently_playing(
        &self,
        user_id: &str,
        access_token: &str,
    ) -> Result<Served<CurrentlyPlaying>> {
        let now = Utc::now();
        let previous: Option<CacheEntry<CurrentlyPlaying>> = match self.lookup(user_id, now).await {
            Lookup::Fresh(entry) => return Ok(self.hit(entry)),
            Lookup::Stale(entry) => Some(entry),
            Lookup::Absent => None,
        };

        let error = match self.upstream.currently_playing(access_token).await {
            Ok(track) => {
                return self
                    .write_back(user_id, normalize::now_playing(track.as_ref()))
                    .await
            }
            Err(e) => e,
        };

        self.stats.record_upstream_failure();
        let window = self.policy.currently_playing_stale_window();
        match previous.filter(|entry| entry.age(now) < window) {
            Some(entry) => Ok(self.fallback(entry, &error)),
            None => {
                warn!(
                    user_id,
                    error = %error,
                    "Now-playing refresh failed, reporting nothing playing"
                );
                Ok(Served {
                    payload: CurrentlyPlaying::nothing(),
                    refreshed_at: now,
                    origin: Origin::Placeholder,
                })
            }
        }
    }

    /// Shared fresh/refresh/fallback flow for the aggregate kinds.
    ///
    /// `fetch` is only polled on a miss.
    async fn serve<T, F>(&self, user_id: &str, fetch: F) -> Result<Served<T>>
    where
        T: Resource,
        F: Future<Output = std::result::Result<T, UpstreamError>>,
    {
        let now = Utc::now();
        let previous: Option<CacheEntry<T>> = match self.lookup(user_id, now).await {
            Lookup::Fresh(entry) => return Ok(self.hit(entry)),
            Lookup::Stale(entry) => Some(entry),
            Lookup::Absent => None,
        };

        match fetch.await {
            Ok(payload) => self.write_back(user_id, payload).await,
            Err(e) => {
                self.stats.record_upstream_failure();
                match previous {
                    Some(entry) => Ok(self.fallback(entry, &e)),
                    None => {
                        warn!(
                            user_id,
                            kind = %T::KIND,
                            error = %e,
                            "Refresh failed with nothing cached"
                        );
                        Err(Error::UpstreamUnavailable(e))
                    }
                }
            }
        }
    }

    /// Read and classify. A failed read counts as absent so the request can
    /// still be served from upstream.
    async fn lookup<T: Resource>(&self, user_id: &str, now: chrono::DateTime<Utc>) -> Lookup<T> {
        match self
            .store
            .lookup::<T>(user_id, self.policy.ttl(T::KIND), now)
            .await
        {
            Ok(lookup) => lookup,
            Err(e) => {
                warn!(
                    user_id,
                    kind = %T::KIND,
                    error = %e,
                    "Cache read failed, treating as absent"
                );
                Lookup::Absent
            }
        }
    }

    fn hit<T: Resource>(&self, entry: CacheEntry<T>) -> Served<T> {
        self.stats.record_hit();
        debug!(user_id = %entry.user_id, kind = %T::KIND, "Cache hit");
        Served::from_entry(entry, Origin::Cache)
    }

    fn fallback<T: Resource>(&self, entry: CacheEntry<T>, error: &UpstreamError) -> Served<T> {
        self.stats.record_stale_fallback();
        warn!(
            user_id = %entry.user_id,
            kind = %T::KIND,
            refreshed_at = %entry.refreshed_at,
            error = %error,
            "Refresh failed, serving stale cache"
        );
        Served::from_entry(entry, Origin::StaleFallback)
    }

    async fn write_back<T: Resource>(&self, user_id: &str, payload: T) -> Result<Served<T>> {
        self.stats.record_refresh();
        let entry = self.store.put(user_id, payload).await.map_err(|e| {
            error!(user_id, kind = %T::KIND, error = %e, "Failed to write refreshed data");
            e
        })?;
        debug!(user_id, kind = %T::KIND, "Cache refreshed");
        Ok(Served::from_entry(entry, Origin::Upstream))
    }
}
