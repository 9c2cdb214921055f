use super::{DocumentKey, DocumentStore, PutReceipt, StoreError, check_status, http_client};
use crate::config::JsonBinSettings;
use async_trait::async_trait;
use reqwest::{StatusCode, header::ACCEPT};
use serde_json::Value;
use tracing::debug;

const ACCESS_KEY_HEADER: &str = "X-Access-Key";

/// JSONBin.io v3 client. Subscribers and apps live in separate bins.
#[derive(Debug, Clone)]
pub struct JsonBinStore {
    client: reqwest::Client,
    settings: JsonBinSettings,
}

impl JsonBinStore {
    pub fn new(settings: JsonBinSettings) -> Result<Self, StoreError> {
        Ok(Self {
            client: http_client()?,
            settings,
        })
    }

    fn bin_id(&self, key: DocumentKey) -> &str {
        match key {
            DocumentKey::Subscribers => &self.settings.bin_id,
            DocumentKey::Apps => &self.settings.apps_bin_id,
        }
    }

    fn bin_url(&self, key: DocumentKey) -> String {
        format!("{}/b/{}", self.settings.base_url.trim_end_matches('/'), self.bin_id(key))
    }
}

#[async_trait]
impl DocumentStore for JsonBinStore {
    async fn get_document(&self, key: DocumentKey) -> Result<Option<Value>, StoreError> {
        let url = format!("{}/latest", self.bin_url(key));
        debug!("GET {url}");

        let response = self
            .client
            .get(&url)
            .header(ACCESS_KEY_HEADER, &self.settings.access_key)
            .header(ACCEPT, "application/json")
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let mut body: Value = check_status(response).await?.json().await?;
        // Responses wrap the document as `record` next to `metadata`.
        let document = match body.get_mut("record").map(Value::take) {
            Some(record) => record,
            None => body,
        };
        Ok(Some(document))
    }

    async fn put_document(&self, key: DocumentKey, document: &Value) -> Result<PutReceipt, StoreError> {
        let url = self.bin_url(key);
        debug!("PUT {url}");

        let response = self
            .client
            .put(&url)
            .header(ACCESS_KEY_HEADER, &self.settings.access_key)
            .json(document)
            .send()
            .await?;

        let body: Value = check_status(response).await?.json().await?;
        Ok(PutReceipt {
            location: self.bin_id(key).to_string(),
            metadata: body.get("metadata").cloned().unwrap_or(Value::Null),
        })
    }

    fn describe(&self) -> String {
        format!(
            "JSONBin at {} (subscribers bin {}, apps bin {})",
            self.settings.base_url, self.settings.bin_id, self.settings.apps_bin_id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::spawn_mock;
    use axum::{
        Json, Router,
        extract::{Path, State},
        http::{HeaderMap, StatusCode},
        routing::get,
    };
    use serde_json::json;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    #[derive(Clone, Default)]
    struct MockBins {
        puts: Arc<Mutex<Vec<(String, Option<String>, Value)>>>,
    }

    async fn latest(Path(bin): Path<String>, headers: HeaderMap) -> Result<Json<Value>, StatusCode> {
        if headers.get("x-access-key").and_then(|v| v.to_str().ok()) != Some("secret") {
            return Err(StatusCode::UNAUTHORIZED);
        }
        match bin.as_str() {
            "subs" => Ok(Json(json!({
                "record": { "subscribers": ["a@b.co"] },
                "metadata": { "id": "subs" }
            }))),
            _ => Err(StatusCode::NOT_FOUND),
        }
    }

    async fn update(
        State(state): State<MockBins>,
        Path(bin): Path<String>,
        headers: HeaderMap,
        Json(body): Json<Value>,
    ) -> Json<Value> {
        let key = headers
            .get("x-access-key")
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        state.puts.lock().await.push((bin.clone(), key, body.clone()));
        Json(json!({ "record": body, "metadata": { "parentId": bin, "private": true } }))
    }

    fn settings(base_url: String, access_key: &str) -> JsonBinSettings {
        JsonBinSettings {
            base_url,
            access_key: access_key.to_string(),
            bin_id: "subs".to_string(),
            apps_bin_id: "apps".to_string(),
        }
    }

    async fn mock() -> (String, MockBins) {
        let state = MockBins::default();
        let router = Router::new()
            .route("/b/:bin/latest", get(latest))
            .route("/b/:bin", axum::routing::put(update))
            .with_state(state.clone());
        (spawn_mock(router).await, state)
    }

    #[tokio::test]
    async fn get_unwraps_record() {
        let (base_url, _) = mock().await;
        let store = JsonBinStore::new(settings(base_url, "secret")).unwrap();

        let document = store.get_document(DocumentKey::Subscribers).await.unwrap().unwrap();
        assert_eq!(document, json!({ "subscribers": ["a@b.co"] }));
    }

    #[tokio::test]
    async fn missing_bin_is_not_found() {
        let (base_url, _) = mock().await;
        let store = JsonBinStore::new(settings(base_url, "secret")).unwrap();

        assert!(store.get_document(DocumentKey::Apps).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn rejected_key_is_status_error() {
        let (base_url, _) = mock().await;
        let store = JsonBinStore::new(settings(base_url, "wrong")).unwrap();

        let err = store.get_document(DocumentKey::Subscribers).await.unwrap_err();
        assert!(matches!(err, StoreError::Status { status: 401, .. }));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn put_targets_the_apps_bin() {
        let (base_url, state) = mock().await;
        let store = JsonBinStore::new(settings(base_url, "secret")).unwrap();

        let receipt = store
            .put_document(DocumentKey::Apps, &json!({ "apps": [], "count": 0 }))
            .await
            .unwrap();

        assert_eq!(receipt.location, "apps");
        assert_eq!(receipt.metadata["parentId"], "apps");
        let puts = state.puts.lock().await;
        assert_eq!(puts.len(), 1);
        assert_eq!(puts[0].0, "apps");
        assert_eq!(puts[0].1.as_deref(), Some("secret"));
        assert_eq!(puts[0].2["count"], 0);
    }
}
