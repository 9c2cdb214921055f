//! Transactional email. Delivery problems are reported as a [`Notification`]
//! value next to the primary result, never as an error of the operation that
//! triggered them.

use crate::config::{Config, EmailJsSettings};
use crate::store::http_client;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value, json};
use std::{fmt, sync::Arc};
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    Sent,
    /// No email service is configured.
    Skipped,
    Failed(String),
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notification::Sent => f.write_str("sent"),
            Notification::Skipped => f.write_str("skipped"),
            Notification::Failed(_) => f.write_str("failed"),
        }
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, template_id: &str, variables: Map<String, Value>) -> Notification;
}

/// Used when no email service is configured.
#[derive(Debug, Default)]
pub struct DisabledNotifier;

#[async_trait]
impl Notifier for DisabledNotifier {
    async fn send(&self, _template_id: &str, _variables: Map<String, Value>) -> Notification {
        Notification::Skipped
    }
}

#[derive(Debug, Serialize)]
struct EmailJsRequest<'a> {
    service_id: &'a str,
    template_id: &'a str,
    user_id: &'a str,
    template_params: Map<String, Value>,
}

#[derive(Debug, Clone)]
pub struct EmailJsNotifier {
    client: reqwest::Client,
    settings: EmailJsSettings,
}

impl EmailJsNotifier {
    pub fn new(settings: EmailJsSettings) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: http_client()?,
            settings,
        })
    }
}

#[async_trait]
impl Notifier for EmailJsNotifier {
    async fn send(&self, template_id: &str, variables: Map<String, Value>) -> Notification {
        let request = EmailJsRequest {
            service_id: &self.settings.service_id,
            template_id,
            user_id: &self.settings.user_id,
            template_params: variables,
        };

        let response = match self.client.post(&self.settings.endpoint).json(&request).send().await {
            Ok(response) => response,
            Err(err) => {
                warn!("email request failed: {err}");
                return Notification::Failed(err.to_string());
            }
        };

        let status = response.status();
        if status.is_success() {
            info!("email sent via template {template_id}");
            Notification::Sent
        } else {
            let body = response.text().await.unwrap_or_default();
            warn!("email service returned {status}: {body}");
            Notification::Failed(format!("{status}: {body}"))
        }
    }
}

/// The welcome email sent to each new subscriber.
#[derive(Debug, Clone)]
pub struct WelcomeEmail {
    pub template_id: String,
    pub from_name: String,
}

impl WelcomeEmail {
    pub fn from_config(config: &Config) -> Self {
        Self {
            template_id: config
                .emailjs
                .as_ref()
                .map(|settings| settings.template_id.clone())
                .unwrap_or_default(),
            from_name: config.from_name.clone(),
        }
    }

    pub fn variables(&self, email: &str) -> Map<String, Value> {
        let to_name = email.split('@').next().unwrap_or(email);
        let variables = json!({
            "to_email": email,
            "to_name": to_name,
            "from_name": self.from_name,
            "message": "Welcome to our newsletter!",
        });
        match variables {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }
}

pub fn build_notifier(config: &Config) -> Result<Arc<dyn Notifier>, reqwest::Error> {
    let notifier: Arc<dyn Notifier> = match &config.emailjs {
        Some(settings) => Arc::new(EmailJsNotifier::new(settings.clone())?),
        None => Arc::new(DisabledNotifier),
    };
    Ok(notifier)
}
