use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::{CacheEntry, Lookup, Resource, ResourceKind};
use crate::store::{DocumentStore, StoreError, UpsertCondition, UpsertOutcome};

/// Key inside each cached field holding the refresh time.
pub const TIMESTAMP_KEY: &str = "datetime_added";

/// Field holding the link a user shares for their profile.
pub const PROFILE_URL_FIELD: &str = "profile_url";

/// On-disk shape of a cached field: the payload's own keys plus the
/// refresh timestamp.
#[derive(Serialize, Deserialize)]
struct StoredEntry<T> {
    datetime_added: DateTime<Utc>,
    #[serde(flatten)]
    payload: T,
}

/// Typed (user, kind) repository over a document store.
#[derive(Clone)]
pub struct ResourceStore {
    documents: Arc<dyn DocumentStore>,
}

impl ResourceStore {
    pub fn new(documents: Arc<dyn DocumentStore>) -> Self {
        Self { documents }
    }

    /// Read the cached value for a user, ignoring freshness.
    pub async fn get<T: Resource>(
        &self,
        user_id: &str,
    ) -> Result<Option<CacheEntry<T>>, StoreError> {
        let Some(raw) = self.documents.find_field(user_id, T::KIND.field()).await? else {
            return Ok(None);
        };

        let stored: StoredEntry<T> =
            serde_json::from_value(raw).map_err(|e| StoreError::Corrupt {
                id: user_id.to_string(),
                reason: format!("{}: {}", T::KIND, e),
            })?;

        Ok(Some(CacheEntry {
            user_id: user_id.to_string(),
            kind: T::KIND,
            payload: stored.payload,
            refreshed_at: stored.datetime_added,
        }))
    }

    /// Read and classify against `ttl` at `now`.
    pub async fn lookup<T: Resource>(
        &self,
        user_id: &str,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<Lookup<T>, StoreError> {
        Ok(Lookup::classify(self.get(user_id).await?, ttl, now))
    }

    /// Write a payload stamped with the current time.
    pub async fn put<T: Resource>(
        &self,
        user_id: &str,
        payload: T,
    ) -> Result<CacheEntry<T>, StoreError> {
        self.put_at(user_id, payload, Utc::now()).await
    }

    /// Write a payload stamped `refreshed_at`.
    ///
    /// The write is skipped when the stored value is already newer, so
    /// concurrent refreshes never move a field backwards in time.
    pub async fn put_at<T: Resource>(
        &self,
        user_id: &str,
        payload: T,
        refreshed_at: DateTime<Utc>,
    ) -> Result<CacheEntry<T>, StoreError> {
        let value = serde_json::to_value(StoredEntry {
            datetime_added: refreshed_at,
            payload: &payload,
        })?;

        let outcome = self
            .documents
            .upsert_field(
                user_id,
                T::KIND.field(),
                value,
                UpsertCondition::UnlessNewer {
                    timestamp_key: TIMESTAMP_KEY,
                    at: refreshed_at,
                },
            )
            .await?;

        if outcome == UpsertOutcome::Skipped {
            debug!(user_id, kind = %T::KIND, "Stored value is newer, write skipped");
        }

        Ok(CacheEntry {
            user_id: user_id.to_string(),
            kind: T::KIND,
            payload,
            refreshed_at,
        })
    }

    /// Encrypted credential blob, if one was registered.
    pub async fn get_token(&self, user_id: &str) -> Result<Option<String>, StoreError> {
        self.get_string(user_id, ResourceKind::Token.field()).await
    }

    pub async fn put_token(&self, user_id: &str, blob: String) -> Result<(), StoreError> {
        self.put_string(user_id, ResourceKind::Token.field(), blob).await
    }

    pub async fn profile_url(&self, user_id: &str) -> Result<Option<String>, StoreError> {
        self.get_string(user_id, PROFILE_URL_FIELD).await
    }

    /// Set the user's profile link, creating the document if needed.
    pub async fn put_profile_url(&self, user_id: &str, url: &str) -> Result<(), StoreError> {
        self.put_string(user_id, PROFILE_URL_FIELD, url.to_string()).await
    }

    async fn get_string(&self, user_id: &str, field: &str) -> Result<Option<String>, StoreError> {
        match self.documents.find_field(user_id, field).await? {
            Some(Value::String(value)) => Ok(Some(value)),
            Some(_) => Err(StoreError::Corrupt {
                id: user_id.to_string(),
                reason: format!("{} field is not a string", field),
            }),
            None => Ok(None),
        }
    }

    async fn put_string(
        &self,
        user_id: &str,
        field: &str,
        value: String,
    ) -> Result<(), StoreError> {
        self.documents
            .upsert_field(user_id, field, Value::String(value), UpsertCondition::Always)
            .await?;
        Ok(())
    }

    /// Refresh time of every cached kind for a user (`None` if never cached).
    pub async fn freshness(
        &self,
        user_id: &str,
    ) -> Result<Vec<(ResourceKind, Option<DateTime<Utc>>)>, StoreError> {
        let doc = self.documents.find_one(user_id).await?.unwrap_or_default();

        Ok(ResourceKind::CACHED
            .into_iter()
            .map(|kind| {
                let refreshed_at = doc
                    .get(kind.field())
                    .and_then(|field| field.get(TIMESTAMP_KEY))
                    .and_then(|ts| serde_json::from_value(ts.clone()).ok());
                (kind, refreshed_at)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CurrentlyPlaying, GenreCount, RecentlyPlayed, TopGenres};
    use crate::store::MemoryDocumentStore;
    use serde_json::json;

    fn genres(names: &[&str]) -> TopGenres {
        TopGenres {
            genres: names
                .iter()
                .map(|name| GenreCount {
                    name: name.to_string(),
                    count: 1,
                })
                .collect(),
        }
    }

    fn store() -> (Arc<MemoryDocumentStore>, ResourceStore) {
        let documents = Arc::new(MemoryDocumentStore::new());
        (documents.clone(), ResourceStore::new(documents))
    }

    #[tokio::test]
    async fn test_read_after_write() {
        let (_, store) = store();
        let written = store.put("alice", genres(&["rock", "jazz"])).await.unwrap();

        let read: CacheEntry<TopGenres> = store.get("alice").await.unwrap().unwrap();
        assert_eq!(read, written);
        assert_eq!(read.payload.genres[1].name, "jazz");
    }

    #[tokio::test]
    async fn test_missing_user_and_missing_kind() {
        let (_, store) = store();
        assert!(store.get::<TopGenres>("nobody").await.unwrap().is_none());

        store.put("alice", genres(&["rock"])).await.unwrap();
        assert!(store.get::<RecentlyPlayed>("alice").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_document_layout() {
        let (documents, store) = store();
        let at = Utc::now();
        store
            .put_at("alice", RecentlyPlayed::default(), at)
            .await
            .unwrap();
        store.put_token("alice", "sealed".into()).await.unwrap();

        let doc = documents.find_one("alice").await.unwrap().unwrap();
        assert_eq!(doc["_id"], "alice");
        assert_eq!(doc["token"], "sealed");
        assert_eq!(doc["recently_played"]["tracks"], json!([]));
        assert_eq!(
            doc["recently_played"][TIMESTAMP_KEY],
            serde_json::to_value(at).unwrap()
        );
    }

    #[tokio::test]
    async fn test_older_write_does_not_overwrite_newer() {
        let (_, store) = store();
        let now = Utc::now();
        store.put_at("alice", genres(&["new"]), now).await.unwrap();
        store
            .put_at("alice", genres(&["old"]), now - Duration::minutes(5))
            .await
            .unwrap();

        let read: CacheEntry<TopGenres> = store.get("alice").await.unwrap().unwrap();
        assert_eq!(read.payload.genres[0].name, "new");
        assert_eq!(read.refreshed_at, now);
    }

    #[tokio::test]
    async fn test_lookup_freshness() {
        let (_, store) = store();
        let now = Utc::now();
        store
            .put_at("alice", CurrentlyPlaying::nothing(), now - Duration::seconds(30))
            .await
            .unwrap();

        let fresh = store
            .lookup::<CurrentlyPlaying>("alice", Duration::seconds(60), now)
            .await
            .unwrap();
        assert!(matches!(fresh, Lookup::Fresh(_)));

        let stale = store
            .lookup::<CurrentlyPlaying>("alice", Duration::seconds(15), now)
            .await
            .unwrap();
        assert!(matches!(stale, Lookup::Stale(_)));
    }

    #[tokio::test]
    async fn test_undecodable_field_is_corrupt() {
        let (documents, store) = store();
        documents
            .upsert_field(
                "alice",
                "top_genres",
                json!({"datetime_added": "yesterday"}),
                UpsertCondition::Always,
            )
            .await
            .unwrap();

        let result = store.get::<TopGenres>("alice").await;
        assert!(matches!(result, Err(StoreError::Corrupt { .. })));
    }

    #[tokio::test]
    async fn test_profile_url_upsert() {
        let (documents, store) = store();
        assert!(store.profile_url("alice").await.unwrap().is_none());

        store.put_profile_url("alice", "https://example.com/a").await.unwrap();
        store.put("alice", genres(&["rock"])).await.unwrap();
        store.put_profile_url("alice", "https://example.com/b").await.unwrap();

        assert_eq!(
            store.profile_url("alice").await.unwrap().as_deref(),
            Some("https://example.com/b")
        );
        let doc = documents.find_one("alice").await.unwrap().unwrap();
        assert!(doc.contains_key("top_genres"));
    }

    #[tokio::test]
    async fn test_non_string_profile_url_is_corrupt() {
        let (documents, store) = store();
        documents
            .upsert_field("alice", PROFILE_URL_FIELD, json!(42), UpsertCondition::Always)
            .await
            .unwrap();

        let result = store.profile_url("alice").await;
        assert!(matches!(result, Err(StoreError::Corrupt { .. })));
    }

    #[tokio::test]
    async fn test_freshness_report() {
        let (_, store) = store();
        let at = Utc::now();
        store.put_at("alice", genres(&["rock"]), at).await.unwrap();

        let report = store.freshness("alice").await.unwrap();
        assert_eq!(report.len(), ResourceKind::CACHED.len());
        for (kind, refreshed_at) in report {
            if kind == ResourceKind::TopGenres {
                assert_eq!(refreshed_at, Some(at));
            } else {
                assert_eq!(refreshed_at, None);
            }
        }
    }
}
