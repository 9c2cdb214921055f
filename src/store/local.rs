use super::{DocumentKey, DocumentStore, PutReceipt, StoreError};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::error;

/// Stores each document as a pretty-printed JSON file in one directory.
#[derive(Debug, Clone)]
pub struct LocalStore {
    data_dir: PathBuf,
}

impl LocalStore {
    pub fn new(data_dir: PathBuf) -> Self {
        Self { data_dir }
    }

    pub fn document_path(&self, key: DocumentKey) -> PathBuf {
        self.data_dir.join(format!("{}.json", key.as_str()))
    }
}

#[async_trait]
impl DocumentStore for LocalStore {
    async fn get_document(&self, key: DocumentKey) -> Result<Option<Value>, StoreError> {
        Ok(load_document(&self.document_path(key)).await)
    }

    async fn put_document(&self, key: DocumentKey, document: &Value) -> Result<PutReceipt, StoreError> {
        let path = self.document_path(key);
        let bytes = persist_document(&path, document).await?;
        Ok(PutReceipt {
            location: path.display().to_string(),
            metadata: json!({ "bytes": bytes }),
        })
    }

    fn describe(&self) -> String {
        format!("local files in {}", self.data_dir.display())
    }
}

async fn load_document(path: &Path) -> Option<Value> {
    match fs::read(path).await {
        Ok(bytes) => match serde_json::from_slice(&bytes) {
            Ok(document) => Some(document),
            Err(err) => {
                error!("failed to parse {}: {err}", path.display());
                None
            }
        },
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => None,
        Err(err) => {
            error!("failed to read {}: {err}", path.display());
            None
        }
    }
}

async fn persist_document(path: &Path, document: &Value) -> Result<usize, StoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    let payload = serde_json::to_vec_pretty(document)?;
    fs::write(path, &payload).await?;
    Ok(payload.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path().to_path_buf());

        assert!(store.get_document(DocumentKey::Subscribers).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn writes_one_file_per_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path().join("nested"));

        let receipt = store
            .put_document(DocumentKey::Apps, &json!({ "apps": [], "count": 0 }))
            .await
            .unwrap();

        let path = store.document_path(DocumentKey::Apps);
        assert!(path.ends_with("apps.json"));
        assert_eq!(receipt.location, path.display().to_string());
        let stored = store.get_document(DocumentKey::Apps).await.unwrap().unwrap();
        assert_eq!(stored["count"], 0);
        assert!(store.get_document(DocumentKey::Subscribers).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn corrupt_file_reads_as_missing() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path().to_path_buf());
        fs::write(store.document_path(DocumentKey::Subscribers), b"{not json")
            .await
            .unwrap();

        assert!(store.get_document(DocumentKey::Subscribers).await.unwrap().is_none());
    }
}
