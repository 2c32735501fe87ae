//! Document store abstraction backing the resource cache.
//!
//! Every user owns one document keyed by `_id`. Each cached resource kind and
//! the encrypted credential live in their own top-level field. The only write
//! primitive is a conditional per-field upsert, which both backends apply
//! atomically per document.
//!
//! Backends:
//! - `MemoryDocumentStore`: process-local, for tests and single-node use
//! - `FileDocumentStore`: one JSON file per user in the data directory

pub mod error;
pub mod file;
pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

pub use error::StoreError;
pub use file::FileDocumentStore;
pub use memory::MemoryDocumentStore;

/// A stored user document.
pub type Document = Map<String, Value>;

/// Field holding the document key.
pub const ID_FIELD: &str = "_id";

/// Guard evaluated against the currently stored field inside the upsert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpsertCondition {
    /// Replace unconditionally.
    Always,
    /// Skip the write if the stored field carries a timestamp (under
    /// `timestamp_key`) newer than `at`.
    UnlessNewer {
        timestamp_key: &'static str,
        at: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// The document did not exist and was created.
    Inserted,
    /// The document existed and the field was replaced.
    Updated,
    /// The condition rejected the write; nothing changed.
    Skipped,
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch a whole document.
    async fn find_one(&self, id: &str) -> Result<Option<Document>, StoreError>;

    /// Fetch one field of a document.
    async fn find_field(&self, id: &str, field: &str) -> Result<Option<Value>, StoreError> {
        Ok(self
            .find_one(id)
            .await?
            .and_then(|mut doc| doc.remove(field)))
    }

    /// Insert the document if absent, else set `field` in place, as one
    /// atomic operation.
    async fn upsert_field(
        &self,
        id: &str,
        field: &str,
        value: Value,
        condition: UpsertCondition,
    ) -> Result<UpsertOutcome, StoreError>;
}

/// Apply an upsert to an in-hand document.
///
/// Returns `None` when the condition rejects the write. Callers must hold
/// whatever lock makes read-modify-write atomic for their backend.
pub(crate) fn merge_field(
    existing: Option<Document>,
    id: &str,
    field: &str,
    value: Value,
    condition: &UpsertCondition,
) -> Option<(Document, UpsertOutcome)> {
    match existing {
        Some(mut doc) => {
            if let UpsertCondition::UnlessNewer { timestamp_key, at } = condition {
                if stored_timestamp(&doc, field, timestamp_key).is_some_and(|ts| ts > *at) {
                    return None;
                }
            }
            doc.insert(field.to_string(), value);
            Some((doc, UpsertOutcome::Updated))
        }
        None => {
            let mut doc = Document::new();
            doc.insert(ID_FIELD.to_string(), Value::String(id.to_string()));
            doc.insert(field.to_string(), value);
            Some((doc, UpsertOutcome::Inserted))
        }
    }
}

fn stored_timestamp(doc: &Document, field: &str, timestamp_key: &str) -> Option<DateTime<Utc>> {
    let raw = doc.get(field)?.get(timestamp_key)?;
    serde_json::from_value(raw.clone()).ok()
}
