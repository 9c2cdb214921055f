//! Whole-document persistence behind one interface.
//!
//! Every backend reads and writes complete JSON documents keyed by
//! [`DocumentKey`]. There is no partial update and no locking: the last full
//! write wins.

mod jsonbin;
mod local;
mod memory;
mod proxy;

pub use jsonbin::JsonBinStore;
pub use local::LocalStore;
pub use memory::MemoryStore;
pub use proxy::ProxyStore;

use crate::config::{Config, StoreBackend};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentKey {
    Subscribers,
    Apps,
}

impl DocumentKey {
    pub fn as_str(self) -> &'static str {
        match self {
            DocumentKey::Subscribers => "subscribers",
            DocumentKey::Apps => "apps",
        }
    }
}

/// What a backend reports after a successful write.
#[derive(Debug, Clone)]
pub struct PutReceipt {
    /// Bin id, file path or URL the document was written to.
    pub location: String,
    pub metadata: Value,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("request to document store failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("document store returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("document store i/o failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("document is malformed: {0}")]
    Malformed(#[from] serde_json::Error),
}

impl StoreError {
    /// Whether retrying the same call could succeed. Data-shape errors never do.
    pub fn is_retryable(&self) -> bool {
        match self {
            StoreError::Transport(_) | StoreError::Io(_) => true,
            StoreError::Status { status, .. } => *status == 429 || *status >= 500,
            StoreError::Malformed(_) => false,
        }
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetches the latest document, `None` when the store has none yet.
    async fn get_document(&self, key: DocumentKey) -> Result<Option<Value>, StoreError>;

    /// Replaces the document in full.
    async fn put_document(&self, key: DocumentKey, document: &Value) -> Result<PutReceipt, StoreError>;

    /// Short human-readable description for startup logs.
    fn describe(&self) -> String;
}

pub fn build_store(config: &Config) -> Result<Arc<dyn DocumentStore>, StoreError> {
    let store: Arc<dyn DocumentStore> = match &config.backend {
        StoreBackend::Memory => Arc::new(MemoryStore::default()),
        StoreBackend::Local { data_dir } => Arc::new(LocalStore::new(data_dir.clone())),
        StoreBackend::JsonBin(settings) => Arc::new(JsonBinStore::new(settings.clone())?),
        StoreBackend::Proxy { base_url } => Arc::new(ProxyStore::new(base_url.clone())?),
    };
    Ok(store)
}

/// Upper bound on any single outbound call, store or email.
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Client shared by the HTTP store backends and the email notifier.
pub(crate) fn http_client() -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(Duration::from_secs(5))
        .timeout(HTTP_TIMEOUT)
        .build()
}

/// Turns a non-success response into [`StoreError::Status`].
pub(crate) async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(StoreError::Status {
        status: status.as_u16(),
        body,
    })
}
