use super::{DocumentKey, DocumentStore, PutReceipt, StoreError};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::HashMap;
use tokio::sync::Mutex;

/// Keeps documents in process memory. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    documents: Mutex<HashMap<DocumentKey, Value>>,
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get_document(&self, key: DocumentKey) -> Result<Option<Value>, StoreError> {
        Ok(self.documents.lock().await.get(&key).cloned())
    }

    async fn put_document(&self, key: DocumentKey, document: &Value) -> Result<PutReceipt, StoreError> {
        self.documents.lock().await.insert(key, document.clone());
        Ok(PutReceipt {
            location: format!("memory:{}", key.as_str()),
            metadata: json!({ "private": true }),
        })
    }

    fn describe(&self) -> String {
        "in-memory store".to_string()
    }
}
