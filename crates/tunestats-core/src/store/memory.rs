use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use super::{merge_field, Document, DocumentStore, StoreError, UpsertCondition, UpsertOutcome};

/// In-memory document store.
///
/// Upserts take the write lock for the whole read-modify-write, so each one
/// is atomic with respect to every other operation.
#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    documents: RwLock<HashMap<String, Document>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn find_one(&self, id: &str) -> Result<Option<Document>, StoreError> {
        Ok(self.documents.read().await.get(id).cloned())
    }

    async fn find_field(&self, id: &str, field: &str) -> Result<Option<Value>, StoreError> {
        Ok(self
            .documents
            .read()
            .await
            .get(id)
            .and_then(|doc| doc.get(field))
            .cloned())
    }

    async fn upsert_field(
        &self,
        id: &str,
        field: &str,
        value: Value,
        condition: UpsertCondition,
    ) -> Result<UpsertOutcome, StoreError> {
        let mut documents = self.documents.write().await;
        let existing = documents.get(id).cloned();
        match merge_field(existing, id, field, value, &condition) {
            Some((doc, outcome)) => {
                documents.insert(id.to_string(), doc);
                Ok(outcome)
            }
            None => Ok(UpsertOutcome::Skipped),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_upsert_inserts_then_updates() {
        let store = MemoryDocumentStore::new();

        let first = store
            .upsert_field("alice", "token", json!("a"), UpsertCondition::Always)
            .await
            .unwrap();
        let second = store
            .upsert_field("alice", "token", json!("b"), UpsertCondition::Always)
            .await
            .unwrap();

        assert_eq!(first, UpsertOutcome::Inserted);
        assert_eq!(second, UpsertOutcome::Updated);
        assert_eq!(store.documents.read().await.len(), 1);
        assert_eq!(store.find_field("alice", "token").await.unwrap(), Some(json!("b")));
    }

    #[tokio::test]
    async fn test_find_missing_document() {
        let store = MemoryDocumentStore::new();
        assert!(store.find_one("nobody").await.unwrap().is_none());
        assert!(store.find_field("nobody", "token").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_concurrent_first_writers_create_one_document() {
        let store = Arc::new(MemoryDocumentStore::new());

        let handles: Vec<_> = ["top_tracks", "top_artists", "playlists", "top_genres"]
            .into_iter()
            .map(|field| {
                let store = Arc::clone(&store);
                tokio::spawn(async move {
                    store
                        .upsert_field("alice", field, json!({"x": field}), UpsertCondition::Always)
                        .await
                })
            })
            .collect();

        let mut inserted = 0;
        for handle in handles {
            if handle.await.unwrap().unwrap() == UpsertOutcome::Inserted {
                inserted += 1;
            }
        }

        assert_eq!(inserted, 1);
        let doc = store.find_one("alice").await.unwrap().unwrap();
        // _id plus the four fields
        assert_eq!(doc.len(), 5);
    }
}
