//! Subscriber operations. Each call reads the whole subscribers document,
//! changes it and writes it back; callers pass the store in and own any
//! serialization between concurrent calls.

use crate::models::{SubscriberSnapshot, SubscribersDocument};
use crate::notify::{Notification, Notifier, WelcomeEmail};
use crate::snapshots::record_snapshot;
use crate::store::{DocumentKey, DocumentStore, PutReceipt, StoreError};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use thiserror::Error;
use tracing::info;

static EMAIL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern compiles"));

#[derive(Debug, Error)]
pub enum NewsletterError {
    #[error("Invalid email address")]
    InvalidEmail,

    #[error("Email already subscribed")]
    AlreadySubscribed,

    #[error("Email not found in subscribers")]
    NotSubscribed,

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone)]
pub struct SavedSubscribers {
    pub document: SubscribersDocument,
    pub receipt: PutReceipt,
}

/// A subscription that was persisted.
#[derive(Debug, Clone)]
pub struct Subscribed {
    pub email: String,
    pub count: usize,
}

/// A subscription that was persisted, plus how the welcome email went.
#[derive(Debug, Clone)]
pub struct SubscribeOutcome {
    pub email: String,
    pub count: usize,
    pub notification: Notification,
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_PATTERN.is_match(email)
}

/// Lowercases, trims and de-duplicates addresses, keeping first occurrences.
pub fn normalize_subscribers(subscribers: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    subscribers
        .into_iter()
        .map(|email| normalize_email(&email))
        .filter(|email| !email.is_empty() && seen.insert(email.clone()))
        .collect()
}

pub async fn load_subscribers(
    store: &dyn DocumentStore,
    now: DateTime<Utc>,
) -> Result<SubscribersDocument, StoreError> {
    let document = match store.get_document(DocumentKey::Subscribers).await? {
        Some(record) => SubscribersDocument::from_record(&record, now),
        None => SubscribersDocument::empty(now),
    };
    Ok(document)
}

/// Writes the full subscribers document, recording today's count in the history.
pub async fn save_subscribers(
    store: &dyn DocumentStore,
    subscribers: Vec<String>,
    history: Vec<SubscriberSnapshot>,
    newsletter_sends: u64,
    now: DateTime<Utc>,
) -> Result<SavedSubscribers, StoreError> {
    let subscribers = normalize_subscribers(subscribers);
    let count = subscribers.len();
    let document = SubscribersDocument {
        historical_data: record_snapshot(history, count as u64, now),
        subscribers,
        last_updated: now,
        count,
        newsletter_sends,
    };

    let receipt = store
        .put_document(DocumentKey::Subscribers, &serde_json::to_value(&document)?)
        .await?;
    info!("saved {count} subscribers to {}", receipt.location);

    Ok(SavedSubscribers { document, receipt })
}

/// Validates and appends an address, then saves. The welcome email is a
/// separate step so callers can send it after releasing their write lock.
pub async fn add_subscriber(
    store: &dyn DocumentStore,
    email: &str,
    now: DateTime<Utc>,
) -> Result<Subscribed, NewsletterError> {
    let email = normalize_email(email);
    if !is_valid_email(&email) {
        return Err(NewsletterError::InvalidEmail);
    }

    let mut current = load_subscribers(store, now).await?;
    if current.subscribers.contains(&email) {
        return Err(NewsletterError::AlreadySubscribed);
    }
    current.subscribers.push(email.clone());

    let saved = save_subscribers(
        store,
        current.subscribers,
        current.historical_data,
        current.newsletter_sends,
        now,
    )
    .await?;

    Ok(Subscribed {
        email,
        count: saved.document.count,
    })
}

pub async fn send_welcome(notifier: &dyn Notifier, welcome: &WelcomeEmail, email: &str) -> Notification {
    notifier.send(&welcome.template_id, welcome.variables(email)).await
}

/// [`add_subscriber`] followed by [`send_welcome`].
pub async fn subscribe(
    store: &dyn DocumentStore,
    notifier: &dyn Notifier,
    welcome: &WelcomeEmail,
    email: &str,
    now: DateTime<Utc>,
) -> Result<SubscribeOutcome, NewsletterError> {
    let Subscribed { email, count } = add_subscriber(store, email, now).await?;
    let notification = send_welcome(notifier, welcome, &email).await;
    Ok(SubscribeOutcome {
        email,
        count,
        notification,
    })
}

pub async fn unsubscribe(
    store: &dyn DocumentStore,
    email: &str,
    now: DateTime<Utc>,
) -> Result<SavedSubscribers, NewsletterError> {
    let email = normalize_email(email);
    let mut current = load_subscribers(store, now).await?;

    let Some(index) = current.subscribers.iter().position(|known| *known == email) else {
        return Err(NewsletterError::NotSubscribed);
    };
    current.subscribers.remove(index);

    let saved = save_subscribers(
        store,
        current.subscribers,
        current.historical_data,
        current.newsletter_sends,
        now,
    )
    .await?;
    Ok(saved)
}

/// Bumps the sent-newsletter counter and returns the new total.
pub async fn record_newsletter_send(
    store: &dyn DocumentStore,
    now: DateTime<Utc>,
) -> Result<u64, StoreError> {
    let current = load_subscribers(store, now).await?;
    let saved = save_subscribers(
        store,
        current.subscribers,
        current.historical_data,
        current.newsletter_sends.saturating_add(1),
        now,
    )
    .await?;
    Ok(saved.document.newsletter_sends)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use chrono::{Duration, TimeZone};
    use serde_json::{Map, Value, json};
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<(String, Map<String, Value>)>>,
        fail: bool,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn send(&self, template_id: &str, variables: Map<String, Value>) -> Notification {
            self.sent.lock().await.push((template_id.to_string(), variables));
            if self.fail {
                Notification::Failed("smtp down".to_string())
            } else {
                Notification::Sent
            }
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 15, 0, 0).unwrap()
    }

    fn welcome() -> WelcomeEmail {
        WelcomeEmail {
            template_id: "template_welcome".to_string(),
            from_name: "Team".to_string(),
        }
    }

    #[test]
    fn email_validation() {
        assert!(is_valid_email("someone@example.com"));
        assert!(!is_valid_email("someone@example"));
        assert!(!is_valid_email("some one@example.com"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email(""));
    }

    #[test]
    fn subscribers_are_normalized() {
        let list = normalize_subscribers(vec![
            " A@B.co ".to_string(),
            "a@b.co".to_string(),
            String::new(),
            "c@d.io".to_string(),
        ]);
        assert_eq!(list, vec!["a@b.co", "c@d.io"]);
    }

    #[tokio::test]
    async fn subscribe_persists_and_welcomes() {
        let store = MemoryStore::default();
        let notifier = RecordingNotifier::default();

        let outcome = subscribe(&store, &notifier, &welcome(), "  New@Example.COM ", now())
            .await
            .unwrap();

        assert_eq!(outcome.email, "new@example.com");
        assert_eq!(outcome.count, 1);
        assert_eq!(outcome.notification, Notification::Sent);

        let document = load_subscribers(&store, now()).await.unwrap();
        assert_eq!(document.subscribers, vec!["new@example.com"]);
        assert_eq!(document.historical_data.len(), 1);
        assert_eq!(document.historical_data[0].count, 1);

        let sent = notifier.sent.lock().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "template_welcome");
        assert_eq!(sent[0].1["to_email"], "new@example.com");
    }

    #[tokio::test]
    async fn subscribe_rejects_invalid_and_duplicate() {
        let store = MemoryStore::default();
        let notifier = RecordingNotifier::default();

        let invalid = subscribe(&store, &notifier, &welcome(), "nope", now()).await;
        assert!(matches!(invalid, Err(NewsletterError::InvalidEmail)));

        subscribe(&store, &notifier, &welcome(), "a@b.co", now()).await.unwrap();
        let duplicate = subscribe(&store, &notifier, &welcome(), "A@B.CO", now()).await;
        assert!(matches!(duplicate, Err(NewsletterError::AlreadySubscribed)));
        assert_eq!(notifier.sent.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn add_subscriber_persists_without_emailing() {
        let store = MemoryStore::default();
        let notifier = RecordingNotifier::default();

        let subscribed = add_subscriber(&store, " A@B.co", now()).await.unwrap();
        assert_eq!(subscribed.email, "a@b.co");
        assert_eq!(subscribed.count, 1);
        assert!(notifier.sent.lock().await.is_empty());

        let notification = send_welcome(&notifier, &welcome(), &subscribed.email).await;
        assert_eq!(notification, Notification::Sent);
        assert_eq!(notifier.sent.lock().await[0].1["to_email"], "a@b.co");
    }

    #[tokio::test]
    async fn failed_welcome_keeps_subscription() {
        let store = MemoryStore::default();
        let notifier = RecordingNotifier {
            fail: true,
            ..Default::default()
        };

        let outcome = subscribe(&store, &notifier, &welcome(), "a@b.co", now()).await.unwrap();

        assert!(matches!(outcome.notification, Notification::Failed(_)));
        let document = load_subscribers(&store, now()).await.unwrap();
        assert_eq!(document.count, 1);
    }

    #[tokio::test]
    async fn unsubscribe_updates_todays_snapshot() {
        let store = MemoryStore::default();
        let notifier = RecordingNotifier::default();
        subscribe(&store, &notifier, &welcome(), "a@b.co", now()).await.unwrap();
        subscribe(&store, &notifier, &welcome(), "c@d.io", now()).await.unwrap();

        let saved = unsubscribe(&store, "A@b.co", now() + Duration::minutes(5)).await.unwrap();

        assert_eq!(saved.document.subscribers, vec!["c@d.io"]);
        assert_eq!(saved.document.historical_data.len(), 1);
        assert_eq!(saved.document.historical_data[0].count, 1);

        let missing = unsubscribe(&store, "a@b.co", now()).await;
        assert!(matches!(missing, Err(NewsletterError::NotSubscribed)));
    }

    #[tokio::test]
    async fn history_carries_across_days() {
        let store = MemoryStore::default();
        let notifier = RecordingNotifier::default();
        subscribe(&store, &notifier, &welcome(), "a@b.co", now()).await.unwrap();
        subscribe(&store, &notifier, &welcome(), "c@d.io", now() + Duration::days(1))
            .await
            .unwrap();

        let document = load_subscribers(&store, now() + Duration::days(1)).await.unwrap();
        let counts: Vec<u64> = document.historical_data.iter().map(|s| s.count).collect();
        assert_eq!(counts, vec![1, 2]);
    }

    #[tokio::test]
    async fn legacy_record_is_upgraded_on_save() {
        let store = MemoryStore::default();
        store
            .put_document(DocumentKey::Subscribers, &json!(["old@list.org"]))
            .await
            .unwrap();

        let sends = record_newsletter_send(&store, now()).await.unwrap();

        assert_eq!(sends, 1);
        let stored = store.get_document(DocumentKey::Subscribers).await.unwrap().unwrap();
        assert_eq!(stored["subscribers"], json!(["old@list.org"]));
        assert_eq!(stored["count"], 1);
        assert_eq!(stored["newsletterSends"], 1);
        assert_eq!(stored["historicalData"][0]["date"], "2024-06-01");
    }
}
