use crate::snapshots::normalize_history;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::warn;

/// One day's recorded subscriber count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriberSnapshot {
    pub date: NaiveDate,
    pub count: u64,
    /// Informational only; stored values that do not parse read as `None`.
    #[serde(
        default,
        deserialize_with = "lenient_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub timestamp: Option<DateTime<Utc>>,
}

fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(parse_timestamp(value.as_ref()))
}

/// The subscribers document as stored and served. Reading goes through
/// [`SubscribersDocument::from_record`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscribersDocument {
    pub subscribers: Vec<String>,
    pub last_updated: DateTime<Utc>,
    pub count: usize,
    pub historical_data: Vec<SubscriberSnapshot>,
    pub newsletter_sends: u64,
}

impl SubscribersDocument {
    pub fn empty(now: DateTime<Utc>) -> Self {
        Self {
            subscribers: Vec::new(),
            last_updated: now,
            count: 0,
            historical_data: Vec::new(),
            newsletter_sends: 0,
        }
    }

    /// Decodes whatever the store holds for the subscribers key.
    ///
    /// Accepts the legacy bare-array format and tolerates missing or mistyped
    /// fields. `count` is always recomputed from the subscriber list.
    pub fn from_record(record: &Value, now: DateTime<Utc>) -> Self {
        if let Some(emails) = record.as_array() {
            let subscribers = string_entries(emails);
            return Self {
                count: subscribers.len(),
                subscribers,
                ..Self::empty(now)
            };
        }

        let Some(object) = record.as_object() else {
            warn!("subscribers record is neither an object nor an array, treating as empty");
            return Self::empty(now);
        };

        if object.get("apps").is_some_and(Value::is_array) && !object.contains_key("subscribers") {
            warn!("subscribers record holds apps data, treating as empty");
            return Self::empty(now);
        }

        let subscribers = object
            .get("subscribers")
            .and_then(Value::as_array)
            .map(|emails| string_entries(emails))
            .unwrap_or_default();

        Self {
            count: subscribers.len(),
            subscribers,
            last_updated: parse_timestamp(object.get("lastUpdated")).unwrap_or(now),
            historical_data: object
                .get("historicalData")
                .map(normalize_history)
                .unwrap_or_default(),
            newsletter_sends: object
                .get("newsletterSends")
                .and_then(Value::as_u64)
                .unwrap_or(0),
        }
    }
}

/// The app catalog document.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppsDocument {
    pub apps: Vec<Value>,
    pub last_updated: DateTime<Utc>,
    pub count: usize,
}

impl AppsDocument {
    pub fn empty(now: DateTime<Utc>) -> Self {
        Self {
            apps: Vec::new(),
            last_updated: now,
            count: 0,
        }
    }

    pub fn from_record(record: &Value, now: DateTime<Utc>) -> Self {
        let apps = record
            .get("apps")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        Self {
            count: apps.len(),
            apps,
            last_updated: parse_timestamp(record.get("lastUpdated")).unwrap_or(now),
        }
    }
}

fn string_entries(values: &[Value]) -> Vec<String> {
    values
        .iter()
        .filter_map(Value::as_str)
        .map(str::to_owned)
        .collect()
}

fn parse_timestamp(value: Option<&Value>) -> Option<DateTime<Utc>> {
    let raw = value?.as_str()?;
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|parsed| parsed.with_timezone(&Utc))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveSubscribersRequest {
    #[serde(default)]
    pub subscribers: Value,
    #[serde(default)]
    pub historical_data: Value,
    #[serde(default)]
    pub newsletter_sends: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct SaveAppsRequest {
    #[serde(default)]
    pub apps: Value,
}

#[derive(Debug, Deserialize)]
pub struct EmailRequest {
    pub email: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveResponse {
    pub success: bool,
    pub message: String,
    pub bin_id: String,
    pub count: usize,
    pub metadata: Value,
}

#[derive(Debug, Serialize)]
pub struct SubscribeResponse {
    pub email: String,
    pub count: usize,
    pub notification: String,
}

#[derive(Debug, Serialize)]
pub struct UnsubscribeResponse {
    pub email: String,
    pub count: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsletterSendsResponse {
    pub newsletter_sends: u64,
}

#[derive(Debug, Serialize)]
pub struct DailyPoint {
    pub date: String,
    pub count: u64,
    pub change: i64,
}

#[derive(Debug, Serialize)]
pub struct WeeklyPoint {
    pub week: String,
    pub start_date: String,
    pub end_date: String,
    pub count: u64,
    pub change: i64,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub current_count: u64,
    pub last_7_days: Vec<DailyPoint>,
    pub weekly: Vec<WeeklyPoint>,
}
