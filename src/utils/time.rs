use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};

/// This is the standard way of converting a date to a string in sitetime.
pub fn date_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Returns start of the next UTC day.
pub fn next_day_start(at: DateTime<Utc>) -> DateTime<Utc> {
    (at.date_naive() + Duration::days(1))
        .and_time(NaiveTime::MIN)
        .and_utc()
}

/// Adds two durations, staying at [Duration::MAX] instead of overflowing.
pub fn saturating_add(a: Duration, b: Duration) -> Duration {
    a.checked_add(&b).unwrap_or(Duration::MAX)
}

/// Returns `count` consecutive days ending with `last`, oldest first.
pub fn days_ending_at(last: NaiveDate, count: u32) -> Vec<NaiveDate> {
    (0..i64::from(count))
        .rev()
        .map(|offset| last - Duration::days(offset))
        .collect()
}
