use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::debug;

use super::{merge_field, Document, DocumentStore, StoreError, UpsertCondition, UpsertOutcome};

/// JSON-file document store: one `<id>.json` per user.
///
/// Writes are serialized through a store-wide lock and committed by writing a
/// temp file and renaming it over the target, so readers never observe a
/// partial document.
pub struct FileDocumentStore {
    data_dir: PathBuf,
    write_lock: Mutex<()>,
}

impl FileDocumentStore {
    pub fn new(data_dir: PathBuf) -> Result<Self, StoreError> {
        std::fs::create_dir_all(&data_dir)?;
        Ok(Self {
            data_dir,
            write_lock: Mutex::new(()),
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn document_path(&self, id: &str) -> PathBuf {
        self.data_dir.join(format!("{}.json", file_stem(id)))
    }

    async fn load(&self, id: &str) -> Result<Option<Document>, StoreError> {
        let path = self.document_path(id);
        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let doc: Document = serde_json::from_str(&contents).map_err(|e| StoreError::Corrupt {
            id: id.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Some(doc))
    }

    async fn save(&self, id: &str, doc: &Document) -> Result<(), StoreError> {
        let path = self.document_path(id);
        let tmp = path.with_extension("json.tmp");
        let contents = serde_json::to_string_pretty(doc)?;
        tokio::fs::write(&tmp, contents).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for FileDocumentStore {
    async fn find_one(&self, id: &str) -> Result<Option<Document>, StoreError> {
        self.load(id).await
    }

    async fn upsert_field(
        &self,
        id: &str,
        field: &str,
        value: Value,
        condition: UpsertCondition,
    ) -> Result<UpsertOutcome, StoreError> {
        let _guard = self.write_lock.lock().await;

        let existing = self.load(id).await?;
        match merge_field(existing, id, field, value, &condition) {
            Some((doc, outcome)) => {
                self.save(id, &doc).await?;
                debug!(user_id = id, field, ?outcome, "Document upserted");
                Ok(outcome)
            }
            None => Ok(UpsertOutcome::Skipped),
        }
    }
}

/// Map a user id onto a safe file name.
/// Ids outside `[A-Za-z0-9._-]` (or starting with '.') are hex-encoded behind a `~`.
fn file_stem(id: &str) -> String {
    let safe = !id.is_empty()
        && !id.starts_with('.')
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
    if safe {
        id.to_string()
    } else {
        let hex: String = id.bytes().map(|b| format!("{:02x}", b)).collect();
        format!("~{}", hex)
    }
}
