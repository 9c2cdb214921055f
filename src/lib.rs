pub mod app;
pub mod catalog;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod newsletter;
pub mod notify;
pub mod snapshots;
pub mod state;
pub mod stats;
pub mod store;

#[cfg(test)]
mod test_support;

pub use app::router;
pub use config::Config;
pub use snapshots::record_snapshot;
pub use state::AppState;
