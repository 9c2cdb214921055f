use crate::models::AppsDocument;
use crate::store::{DocumentKey, DocumentStore, PutReceipt, StoreError};
use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::info;

pub async fn load_apps(store: &dyn DocumentStore, now: DateTime<Utc>) -> Result<AppsDocument, StoreError> {
    let document = match store.get_document(DocumentKey::Apps).await? {
        Some(record) => AppsDocument::from_record(&record, now),
        None => AppsDocument::empty(now),
    };
    Ok(document)
}

pub async fn save_apps(
    store: &dyn DocumentStore,
    apps: Vec<Value>,
    now: DateTime<Utc>,
) -> Result<(AppsDocument, PutReceipt), StoreError> {
    let document = AppsDocument {
        count: apps.len(),
        apps,
        last_updated: now,
    };

    let receipt = store
        .put_document(DocumentKey::Apps, &serde_json::to_value(&document)?)
        .await?;
    info!("saved {} apps to {}", document.count, receipt.location);

    Ok((document, receipt))
}
