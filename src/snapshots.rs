use crate::models::SubscriberSnapshot;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;

/// Snapshots older than this many days before the write are dropped.
pub const RETENTION_DAYS: i64 = 90;

/// Upserts today's subscriber count into `history`, prunes entries outside the
/// retention window and returns the history sorted by date.
///
/// An existing entry for today is only rewritten when its count differs, so
/// repeated calls on the same day with the same count leave the original
/// timestamp in place. Duplicate dates in the input collapse to the last one.
pub fn record_snapshot(
    history: Vec<SubscriberSnapshot>,
    current_count: u64,
    now: DateTime<Utc>,
) -> Vec<SubscriberSnapshot> {
    let today = now.date_naive();
    let cutoff = today - Duration::days(RETENTION_DAYS);

    let mut by_date: BTreeMap<NaiveDate, SubscriberSnapshot> = history
        .into_iter()
        .map(|snapshot| (snapshot.date, snapshot))
        .collect();

    let unchanged = by_date
        .get(&today)
        .is_some_and(|snapshot| snapshot.count == current_count);
    if !unchanged {
        by_date.insert(
            today,
            SubscriberSnapshot {
                date: today,
                count: current_count,
                timestamp: Some(now),
            },
        );
    }

    by_date.split_off(&cutoff).into_values().collect()
}

/// Decodes a stored `historicalData` value. Anything that is not an array is
/// treated as an empty history; entries that do not parse are skipped.
pub fn normalize_history(value: &Value) -> Vec<SubscriberSnapshot> {
    let Some(entries) = value.as_array() else {
        if !value.is_null() {
            debug!("historicalData is not an array, treating as empty");
        }
        return Vec::new();
    };

    entries
        .iter()
        .filter_map(|entry| match SubscriberSnapshot::deserialize(entry) {
            Ok(snapshot) => Some(snapshot),
            Err(err) => {
                debug!("skipping malformed snapshot {entry}: {err}");
                None
            }
        })
        .collect()
}
