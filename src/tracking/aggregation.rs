use chrono::{Duration, NaiveDate};
use tracing::{debug, info};

use crate::{
    daemon::storage::{
        entities::{CurrentPeriod, DailySummary, History},
        kv::{KeyValueStore, Record, Writes},
    },
    utils::time::saturating_add,
};

use super::{error::EngineError, mutation::transact};

#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub struct RollupReport {
    pub days: usize,
    pub domains: usize,
    pub total_time: Duration,
}

impl Default for RollupReport {
    fn default() -> Self {
        Self {
            days: 0,
            domains: 0,
            total_time: Duration::zero(),
        }
    }
}

/// Merges every day of the period into the matching day of the history.
pub fn merge_into_history(history: &mut History, period: &CurrentPeriod) -> RollupReport {
    let mut report = RollupReport::default();
    for (date, sites) in period.0.iter().filter(|(_, sites)| !sites.is_empty()) {
        let day = history.day_mut(*date);
        for (domain, entry) in sites {
            day.merge_site(domain, entry);
            report.domains += 1;
            report.total_time = saturating_add(report.total_time, entry.total_time);
        }
        report.days += 1;
    }
    report
}

/// What a day looks like right now: its aggregated history plus time still in the current period.
pub fn current_view(history: &History, period: &CurrentPeriod, date: NaiveDate) -> DailySummary {
    let mut view = history
        .day(date)
        .cloned()
        .unwrap_or_else(|| DailySummary::empty(date));
    if let Some(sites) = period.day(date) {
        for (domain, entry) in sites {
            view.merge_site(domain, entry);
        }
    }
    view
}

/// Moves the current period into [History] and clears it, in a single write.
pub struct DailyAggregator<'a, S: ?Sized> {
    store: &'a S,
    max_attempts: u32,
}

impl<'a, S: KeyValueStore + ?Sized> DailyAggregator<'a, S> {
    pub fn new(store: &'a S, max_attempts: u32) -> Self {
        Self {
            store,
            max_attempts,
        }
    }

    /// Every day of the period is merged into its own date, so it doesn't matter when this runs.
    /// Running it on an empty period writes nothing.
    pub async fn rollup(&self) -> Result<RollupReport, EngineError> {
        let keys = [CurrentPeriod::KEY, History::KEY];
        let report = transact(self.store, &keys, self.max_attempts, |snapshot| {
            let period = snapshot.decode::<CurrentPeriod>()?;
            if period.is_empty() {
                return Ok((RollupReport::default(), Writes::new()));
            }
            let mut history = snapshot.decode::<History>()?;
            let report = merge_into_history(&mut history, &period);
            let writes = Writes::new()
                .put(&history)?
                .put(&CurrentPeriod::default())?;
            Ok((report, writes))
        })
        .await?;

        if report.days == 0 {
            debug!("Nothing to aggregate");
        } else {
            info!(
                "Aggregated {} domains over {} days, {}s in total",
                report.domains,
                report.days,
                report.total_time.num_seconds()
            );
        }
        Ok(report)
    }
}
