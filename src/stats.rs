use crate::models::{DailyPoint, StatsResponse, SubscriberSnapshot, WeeklyPoint};
use chrono::{Datelike, Duration, NaiveDate, Utc};
use std::collections::BTreeMap;

pub fn build_stats(history: &[SubscriberSnapshot]) -> StatsResponse {
    build_stats_at(Utc::now().date_naive(), history)
}

/// Subscriber-count series ending at `today`. Days without a snapshot carry
/// the most recent earlier count forward.
pub fn build_stats_at(today: NaiveDate, history: &[SubscriberSnapshot]) -> StatsResponse {
    const WEEK_COUNT: usize = 8;

    let counts: BTreeMap<NaiveDate, u64> = history
        .iter()
        .map(|snapshot| (snapshot.date, snapshot.count))
        .collect();
    let count_on = |date: NaiveDate| {
        counts
            .range(..=date)
            .next_back()
            .map_or(0, |(_, count)| *count)
    };

    let mut last_7_days = Vec::with_capacity(7);
    for offset in (0..7).rev() {
        let date = today - Duration::days(offset);
        let count = count_on(date);
        last_7_days.push(DailyPoint {
            date: date.to_string(),
            count,
            change: change(count_on(date - Duration::days(1)), count),
        });
    }

    let current_week_start = week_start(today);
    let mut weekly = Vec::with_capacity(WEEK_COUNT);

    for offset in (0..WEEK_COUNT).rev() {
        let start = current_week_start - Duration::weeks(offset as i64);
        let end = start + Duration::days(6);
        let count = count_on(end.min(today));

        weekly.push(WeeklyPoint {
            week: week_label(start),
            start_date: start.to_string(),
            end_date: end.to_string(),
            count,
            change: change(count_on(start - Duration::days(1)), count),
        });
    }

    StatsResponse {
        current_count: count_on(today),
        last_7_days,
        weekly,
    }
}

fn change(previous: u64, current: u64) -> i64 {
    current as i64 - previous as i64
}

fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_monday() as i64)
}

fn week_label(date: NaiveDate) -> String {
    let iso = date.iso_week();
    format!("{}-W{:02}", iso.year(), iso.week())
}
