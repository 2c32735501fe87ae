//! In-process fakes shared by unit tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::models::{PlayHistory, RawArtist, RawPlaylist, RawTrack, TimeWindow, UserInfo};
use crate::store::{
    Document, DocumentStore, MemoryDocumentStore, StoreError, UpsertCondition, UpsertOutcome,
};
use crate::upstream::{
    Authorizer, NewPlaylist, TokenGrant, UpstreamActions, UpstreamError, UpstreamFetcher,
};

pub(crate) fn raw_track(id: &str) -> RawTrack {
    serde_json::from_value(json!({
        "id": id,
        "name": format!("Track {}", id),
        "artists": [{"id": "artist-1", "name": "Artist"}],
        "album": {
            "name": "Album",
            "images": [{"url": format!("https://img/{}/640", id), "width": 640, "height": 640}]
        },
        "external_urls": {"spotify": format!("https://open.spotify.com/track/{}", id)}
    }))
    .unwrap()
}

pub(crate) fn raw_artist(id: &str, genres: &[&str]) -> RawArtist {
    serde_json::from_value(json!({
        "id": id,
        "name": format!("Artist {}", id),
        "genres": genres,
        "followers": {"total": 100},
        "external_urls": {"spotify": format!("https://open.spotify.com/artist/{}", id)}
    }))
    .unwrap()
}

pub(crate) fn raw_playlist(id: &str, public: bool) -> RawPlaylist {
    serde_json::from_value(json!({
        "id": id,
        "name": format!("Playlist {}", id),
        "public": public,
        "images": [{"url": format!("https://img/{}", id)}],
        "external_urls": {"spotify": format!("https://open.spotify.com/playlist/{}", id)}
    }))
    .unwrap()
}

pub(crate) fn user_info(id: &str) -> UserInfo {
    serde_json::from_value(json!({"id": id, "display_name": id.to_uppercase()})).unwrap()
}

/// Upstream with canned data, a failure switch and call counters.
///
/// Top artists carry genres per window: short `rock, indie`, medium `rock`,
/// long `jazz`. Playlists `p1` and `p3` are public with 11 and 33 followers.
/// Playlists created through `UpstreamActions` show up in later listings.
#[derive(Default)]
pub(crate) struct FakeUpstream {
    calls: AtomicUsize,
    follower_lookups: AtomicUsize,
    failing: AtomicBool,
    playing: Mutex<Option<RawTrack>>,
    followed: Mutex<Vec<RawPlaylist>>,
    created: Mutex<Vec<RawPlaylist>>,
    queued: Mutex<Vec<String>>,
    additions: Mutex<Vec<(String, Vec<String>)>>,
}

impl FakeUpstream {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub(crate) fn set_playing(&self, track: Option<RawTrack>) {
        *self.playing.lock().unwrap() = track;
    }

    /// Total calls, including failed ones.
    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn follower_lookups(&self) -> usize {
        self.follower_lookups.load(Ordering::SeqCst)
    }

    /// List a playlist owned by another account.
    pub(crate) fn follow_playlist(&self, id: &str, name: &str, owner: &str) {
        let playlist = serde_json::from_value(json!({
            "id": id,
            "name": name,
            "public": true,
            "owner": {"id": owner}
        }))
        .unwrap();
        self.followed.lock().unwrap().push(playlist);
    }

    pub(crate) fn created_playlists(&self) -> Vec<RawPlaylist> {
        self.created.lock().unwrap().clone()
    }

    pub(crate) fn queued(&self) -> Vec<String> {
        self.queued.lock().unwrap().clone()
    }

    pub(crate) fn playlist_additions(&self) -> Vec<(String, Vec<String>)> {
        self.additions.lock().unwrap().clone()
    }

    fn enter(&self) -> Result<(), UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(UpstreamError::ServerError("upstream down".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl UpstreamFetcher for FakeUpstream {
    async fn current_user(&self, _access_token: &str) -> Result<UserInfo, UpstreamError> {
        self.enter()?;
        Ok(user_info("alice"))
    }

    async fn top_tracks(
        &self,
        _access_token: &str,
        window: TimeWindow,
        _limit: u32,
    ) -> Result<Vec<RawTrack>, UpstreamError> {
        self.enter()?;
        Ok(vec![
            raw_track(&format!("{}-1", window)),
            raw_track(&format!("{}-2", window)),
        ])
    }

    async fn top_artists(
        &self,
        _access_token: &str,
        window: TimeWindow,
        _limit: u32,
    ) -> Result<Vec<RawArtist>, UpstreamError> {
        self.enter()?;
        let genres: &[&str] = match window {
            TimeWindow::ShortTerm => &["rock", "indie"],
            TimeWindow::MediumTerm => &["rock"],
            TimeWindow::LongTerm => &["jazz"],
        };
        Ok(vec![raw_artist(&format!("{}-1", window), genres)])
    }

    async fn playlists(&self, _access_token: &str) -> Result<Vec<RawPlaylist>, UpstreamError> {
        self.enter()?;
        let mut playlists = vec![
            raw_playlist("p1", true),
            raw_playlist("p2", false),
            raw_playlist("p3", true),
        ];
        playlists.extend(self.followed.lock().unwrap().iter().cloned());
        playlists.extend(self.created.lock().unwrap().iter().cloned());
        Ok(playlists)
    }

    async fn playlist_followers(
        &self,
        _access_token: &str,
        playlist_id: &str,
    ) -> Result<u64, UpstreamError> {
        self.enter()?;
        self.follower_lookups.fetch_add(1, Ordering::SeqCst);
        Ok(match playlist_id {
            "p1" => 11,
            "p3" => 33,
            _ => 0,
        })
    }

    async fn recently_played(
        &self,
        _access_token: &str,
        _limit: u32,
    ) -> Result<Vec<PlayHistory>, UpstreamError> {
        self.enter()?;
        Ok(vec![
            PlayHistory {
                track: raw_track("recent-1"),
                played_at: "2024-05-01T10:05:00.000Z".into(),
            },
            PlayHistory {
                track: raw_track("recent-2"),
                played_at: "2024-05-01T10:01:00.000Z".into(),
            },
        ])
    }

    async fn currently_playing(
        &self,
        _access_token: &str,
    ) -> Result<Option<RawTrack>, UpstreamError> {
        self.enter()?;
        Ok(self.playing.lock().unwrap().clone())
    }
}

#[async_trait]
impl UpstreamActions for FakeUpstream {
    async fn add_to_queue(&self, _access_token: &str, uri: &str) -> Result<(), UpstreamError> {
        self.enter()?;
        self.queued.lock().unwrap().push(uri.to_string());
        Ok(())
    }

    async fn create_playlist(
        &self,
        _access_token: &str,
        user_id: &str,
        playlist: &NewPlaylist,
    ) -> Result<RawPlaylist, UpstreamError> {
        self.enter()?;
        let mut created = self.created.lock().unwrap();
        let created_playlist: RawPlaylist = serde_json::from_value(json!({
            "id": format!("created-{}", created.len() + 1),
            "name": playlist.name,
            "public": playlist.public,
            "owner": {"id": user_id}
        }))
        .unwrap();
        created.push(created_playlist.clone());
        Ok(created_playlist)
    }

    async fn add_to_playlist(
        &self,
        _access_token: &str,
        playlist_id: &str,
        uris: &[String],
    ) -> Result<String, UpstreamError> {
        self.enter()?;
        let mut additions = self.additions.lock().unwrap();
        additions.push((playlist_id.to_string(), uris.to_vec()));
        Ok(format!("snapshot-{}", additions.len()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RefreshBehavior {
    /// Issue a new access token, keeping the refresh token.
    Grant,
    /// Issue a new access token and a rotated refresh token.
    Rotate,
    /// Refuse the refresh token.
    Reject,
    /// Fail as if the accounts service were down.
    Unreachable,
    /// Answer with a lifetime no timestamp can hold.
    Unbounded,
}

pub(crate) struct FakeAuthorizer {
    behavior: Mutex<RefreshBehavior>,
    calls: AtomicUsize,
}

impl FakeAuthorizer {
    pub(crate) fn new(behavior: RefreshBehavior) -> Self {
        Self {
            behavior: Mutex::new(behavior),
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Authorizer for FakeAuthorizer {
    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, UpstreamError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let behavior = *self.behavior.lock().unwrap();
        match behavior {
            RefreshBehavior::Grant | RefreshBehavior::Rotate => Ok(TokenGrant {
                access_token: format!("access-{}", n),
                token_type: Some("Bearer".into()),
                expires_in: 3600,
                refresh_token: (behavior == RefreshBehavior::Rotate)
                    .then(|| format!("{}-rotated-{}", refresh_token, n)),
                scope: None,
            }),
            RefreshBehavior::Unbounded => Ok(TokenGrant {
                access_token: format!("access-{}", n),
                token_type: Some("Bearer".into()),
                expires_in: i64::MAX,
                refresh_token: None,
                scope: None,
            }),
            RefreshBehavior::Reject => Err(UpstreamError::InvalidGrant("revoked".into())),
            RefreshBehavior::Unreachable => Err(UpstreamError::ServerError("accounts down".into())),
        }
    }
}

/// Memory store whose reads and writes can be made to fail.
#[derive(Default)]
pub(crate) struct FlakyStore {
    inner: MemoryDocumentStore,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl FlakyStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl DocumentStore for FlakyStore {
    async fn find_one(&self, id: &str) -> Result<Option<Document>, StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("reads disabled".into()));
        }
        self.inner.find_one(id).await
    }

    async fn find_field(&self, id: &str, field: &str) -> Result<Option<Value>, StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("reads disabled".into()));
        }
        self.inner.find_field(id, field).await
    }

    async fn upsert_field(
        &self,
        id: &str,
        field: &str,
        value: Value,
        condition: UpsertCondition,
    ) -> Result<UpsertOutcome, StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("writes disabled".into()));
        }
        self.inner.upsert_field(id, field, value, condition).await
    }
}
