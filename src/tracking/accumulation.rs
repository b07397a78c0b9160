use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use tracing::debug;

use crate::{
    daemon::storage::{
        entities::{CurrentPeriod, SiteTimeEntry},
        kv::{KeyValueStore, Record, StoreKey, Writes},
    },
    utils::time::next_day_start,
};

use super::{error::EngineError, mutation::transact, session::Flush};

/// Splits the interval from `start` to `end` at every UTC midnight it crosses. Each part is paired
/// with the date it belongs to. Used so that a session running over midnight is attributed to both
/// days proportionally.
pub fn split_by_day(start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<(NaiveDate, Duration)> {
    let mut parts = vec![];
    let mut current = start;
    while current < end {
        let boundary = next_day_start(current).min(end);
        parts.push((current.date_naive(), boundary - current));
        current = boundary;
    }
    parts
}

/// Adds a flush to the period. The visit is counted on the day the session started. Returns the
/// entry of the day the flush ended on.
pub fn add_flush(period: &mut CurrentPeriod, flush: &Flush, now: DateTime<Utc>) -> SiteTimeEntry {
    let parts = split_by_day(flush.started_at, flush.ended_at);
    let last = parts.len().saturating_sub(1);
    let mut updated = SiteTimeEntry::default();
    for (index, (date, elapsed)) in parts.into_iter().enumerate() {
        let visits = if index == 0 { flush.visits } else { 0 };
        let seen_at = if index == last {
            now
        } else {
            next_day_start(date.and_time(NaiveTime::MIN).and_utc())
        };
        let entry = period.entry(date, &flush.domain);
        entry.add(elapsed, visits, seen_at);
        updated = entry.clone();
    }
    updated
}

/// Durable running totals of the current, not yet aggregated, period.
pub struct AccumulationStore<'a, S: ?Sized> {
    store: &'a S,
    max_attempts: u32,
}

impl<'a, S: KeyValueStore + ?Sized> AccumulationStore<'a, S> {
    pub fn new(store: &'a S, max_attempts: u32) -> Self {
        Self {
            store,
            max_attempts,
        }
    }

    /// Atomically adds the flush to the stored period.
    pub async fn apply(&self, flush: &Flush, now: DateTime<Utc>) -> Result<SiteTimeEntry, EngineError> {
        let entry = transact(self.store, &[CurrentPeriod::KEY], self.max_attempts, |snapshot| {
            let mut period = snapshot.decode::<CurrentPeriod>()?;
            let entry = add_flush(&mut period, flush, now);
            Ok((entry, Writes::new().put(&period)?))
        })
        .await?;
        debug!(
            "Accumulated {} on {}, now {}ms over {} visits",
            flush.elapsed(),
            flush.domain,
            entry.total_time.num_milliseconds(),
            entry.visits
        );
        Ok(entry)
    }

    pub async fn snapshot(&self) -> Result<CurrentPeriod, EngineError> {
        let snapshot = self.store.get(vec![StoreKey::CurrentPeriod]).await?;
        Ok(snapshot.decode()?)
    }

    pub async fn clear(&self) -> Result<(), EngineError> {
        transact(self.store, &[CurrentPeriod::KEY], self.max_attempts, |snapshot| {
            if snapshot.decode::<CurrentPeriod>()?.is_empty() {
                return Ok(((), Writes::new()));
            }
            Ok(((), Writes::new().put(&CurrentPeriod::default())?))
        })
        .await
    }
}
