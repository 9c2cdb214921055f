use crate::config::Config;
use crate::notify::{Notifier, WelcomeEmail};
use crate::store::DocumentStore;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub notifier: Arc<dyn Notifier>,
    pub welcome: WelcomeEmail,
    pub allowed_origins: Arc<Vec<String>>,
    /// Serializes read-modify-write cycles on the store within this process.
    pub write_lock: Arc<Mutex<()>>,
}

impl AppState {
    pub fn new(config: &Config, store: Arc<dyn DocumentStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            store,
            notifier,
            welcome: WelcomeEmail::from_config(config),
            allowed_origins: Arc::new(config.allowed_origins.clone()),
            write_lock: Arc::new(Mutex::new(())),
        }
    }
}
