use super::{DocumentKey, DocumentStore, PutReceipt, StoreError, check_status, http_client};
use async_trait::async_trait;
use reqwest::{StatusCode, header::ACCEPT};
use serde_json::Value;
use tracing::debug;

/// Reads and writes through another deployment of this service's HTTP API,
/// which holds the real store credentials.
#[derive(Debug, Clone)]
pub struct ProxyStore {
    client: reqwest::Client,
    base_url: String,
}

impl ProxyStore {
    pub fn new(base_url: String) -> Result<Self, StoreError> {
        Ok(Self {
            client: http_client()?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn read_url(&self, key: DocumentKey) -> String {
        format!("{}/{}", self.base_url, key.as_str())
    }

    fn save_url(&self, key: DocumentKey) -> String {
        format!("{}/{}-save", self.base_url, key.as_str())
    }
}

#[async_trait]
impl DocumentStore for ProxyStore {
    async fn get_document(&self, key: DocumentKey) -> Result<Option<Value>, StoreError> {
        let url = self.read_url(key);
        debug!("GET {url}");

        let response = self
            .client
            .get(&url)
            .header(ACCEPT, "application/json")
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        Ok(Some(check_status(response).await?.json().await?))
    }

    async fn put_document(&self, key: DocumentKey, document: &Value) -> Result<PutReceipt, StoreError> {
        let url = self.save_url(key);
        debug!("POST {url}");

        let response = self
            .client
            .post(&url)
            .header(ACCEPT, "application/json")
            .json(document)
            .send()
            .await?;

        let body: Value = check_status(response).await?.json().await?;
        let location = body
            .get("binId")
            .and_then(Value::as_str)
            .map(str::to_owned)
            .unwrap_or(url);
        Ok(PutReceipt {
            location,
            metadata: body.get("metadata").cloned().unwrap_or(Value::Null),
        })
    }

    fn describe(&self) -> String {
        format!("proxy to {}", self.base_url)
    }
}
