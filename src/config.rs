use std::{env, path::PathBuf};
use thiserror::Error;
use tracing::info;

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_JSONBIN_BASE_URL: &str = "https://api.jsonbin.io/v3";
pub const DEFAULT_EMAILJS_ENDPOINT: &str = "https://api.emailjs.com/api/v1.0/email/send";
const DEFAULT_ALLOWED_ORIGINS: &[&str] = &["http://localhost:3000", "http://localhost:8080"];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key} must be set when STORE_BACKEND is {backend}")]
    Missing { key: &'static str, backend: &'static str },

    #[error("invalid {key} value {value:?}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonBinSettings {
    pub base_url: String,
    pub access_key: String,
    pub bin_id: String,
    pub apps_bin_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    Local { data_dir: PathBuf },
    JsonBin(JsonBinSettings),
    Proxy { base_url: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailJsSettings {
    pub endpoint: String,
    pub service_id: String,
    pub template_id: String,
    pub user_id: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub backend: StoreBackend,
    /// Welcome emails are disabled when this is `None`.
    pub emailjs: Option<EmailJsSettings>,
    pub from_name: String,
    pub allowed_origins: Vec<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any variable source. Values are trimmed
    /// and empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let port = match var("PORT") {
            Some(value) => value
                .parse::<u16>()
                .map_err(|_| ConfigError::Invalid { key: "PORT", value })?,
            None => DEFAULT_PORT,
        };

        let backend_name = var("STORE_BACKEND").unwrap_or_else(|| {
            info!("STORE_BACKEND not set, using local files");
            "local".to_string()
        });
        let backend = match backend_name.to_ascii_lowercase().as_str() {
            "memory" => StoreBackend::Memory,
            "local" => StoreBackend::Local {
                data_dir: PathBuf::from(var("APP_DATA_DIR").unwrap_or_else(|| "data".to_string())),
            },
            "jsonbin" => {
                let required = |key: &'static str| {
                    var(key).ok_or(ConfigError::Missing { key, backend: "jsonbin" })
                };
                let access_key = required("JSONBIN_ACCESS_KEY")?;
                let bin_id = required("JSONBIN_BIN_ID")?;
                StoreBackend::JsonBin(JsonBinSettings {
                    base_url: var("JSONBIN_BASE_URL")
                        .unwrap_or_else(|| DEFAULT_JSONBIN_BASE_URL.to_string()),
                    apps_bin_id: var("JSONBIN_APPS_BIN_ID").unwrap_or_else(|| bin_id.clone()),
                    access_key,
                    bin_id,
                })
            }
            "proxy" => StoreBackend::Proxy {
                base_url: var("SERVERLESS_API_URL").ok_or(ConfigError::Missing {
                    key: "SERVERLESS_API_URL",
                    backend: "proxy",
                })?,
            },
            _ => {
                return Err(ConfigError::Invalid {
                    key: "STORE_BACKEND",
                    value: backend_name,
                });
            }
        };

        let emailjs = match (
            var("EMAILJS_SERVICE_ID"),
            var("EMAILJS_TEMPLATE_ID"),
            var("EMAILJS_USER_ID"),
        ) {
            (Some(service_id), Some(template_id), Some(user_id)) => Some(EmailJsSettings {
                endpoint: var("EMAILJS_ENDPOINT").unwrap_or_else(|| DEFAULT_EMAILJS_ENDPOINT.to_string()),
                service_id,
                template_id,
                user_id,
            }),
            _ => None,
        };

        let allowed_origins = match var("ALLOWED_ORIGINS") {
            Some(list) => list
                .split(',')
                .map(str::trim)
                .filter(|origin| !origin.is_empty())
                .map(str::to_owned)
                .collect(),
            None => DEFAULT_ALLOWED_ORIGINS.iter().map(|origin| origin.to_string()).collect(),
        };

        Ok(Self {
            port,
            backend,
            emailjs,
            from_name: var("NEWSLETTER_FROM_NAME").unwrap_or_else(|| "Newsletter".to_string()),
            allowed_origins,
        })
    }
}
