//! Site time tracking engine. Browser events go in through [Engine::handle_event], the
//! [session::SessionTracker] turns them into flushes, which are accumulated in the current period
//! and periodically rolled up into daily history.
//!
//! All writes go through [mutation::transact], so concurrent writers (the daemon and the cli share
//! the same store) never lose each others updates.

use std::{collections::VecDeque, sync::Arc};

use chrono::{DateTime, Duration, NaiveDate, Utc};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::{
    daemon::storage::{
        entities::{
            Categories, CategoryRule, CurrentPeriod, DailySummary, ExportSnapshot, History,
        },
        kv::{KeyValueStore, Record, StoreKey, Writes},
    },
    utils::{clock::Clock, time::days_ending_at},
};

use accumulation::AccumulationStore;
use aggregation::{current_view, DailyAggregator, RollupReport};
use category::{normalize_rule, time_by_category, CategoryUsage};
use error::EngineError;
use event::{BrowserEvent, TickTag};
use mutation::transact;
use session::{Flush, Session, SessionTracker};

pub mod accumulation;
pub mod aggregation;
pub mod category;
pub mod domain;
pub mod error;
pub mod event;
pub mod mutation;
pub mod score;
pub mod session;

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Sessions must last strictly longer than this to be counted.
    pub min_dwell: Duration,
    pub max_write_attempts: u32,
    /// Upper bound of flushes kept in memory while the store is failing. The oldest are dropped
    /// beyond it.
    pub max_pending_flushes: usize,
    /// Name of the category whose patterns count as productive.
    pub work_category: String,
    /// Written on first start, when the store holds no categories yet.
    pub default_categories: Vec<CategoryRule>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_dwell: Duration::seconds(1),
            max_write_attempts: 5,
            max_pending_flushes: 1024,
            work_category: "work".into(),
            default_categories: default_categories(),
        }
    }
}

pub fn default_categories() -> Vec<CategoryRule> {
    vec![
        CategoryRule::new("social", &["facebook.com", "twitter.com", "instagram.com"]),
        CategoryRule::new("work", &["github.com", "docs.google.com", "slack.com"]),
        CategoryRule::new("entertainment", &["youtube.com", "netflix.com", "twitch.tv"]),
    ]
}

struct EngineState {
    tracker: SessionTracker,
    /// Flushes that are not persisted yet, oldest first.
    pending: VecDeque<Flush>,
    max_pending: usize,
}

impl EngineState {
    /// Queues `flush` for writing. A flush continuing the last queued one on the same domain and
    /// day is merged into it, checkpoints of a long session therefore take a single slot.
    fn enqueue(&mut self, flush: Flush) {
        if let Some(last) = self.pending.back_mut() {
            if last.domain == flush.domain
                && last.ended_at == flush.started_at
                && last.started_at.date_naive() == flush.ended_at.date_naive()
            {
                last.ended_at = flush.ended_at;
                last.visits = last.visits.saturating_add(flush.visits);
                return;
            }
        }

        self.pending.push_back(flush);
        while self.pending.len() > self.max_pending {
            if let Some(dropped) = self.pending.pop_front() {
                error!(
                    "Too many unsaved flushes, dropping {} on {}",
                    dropped.elapsed(),
                    dropped.domain
                );
            }
        }
    }
}

pub struct Engine<S> {
    store: S,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
    state: Mutex<EngineState>,
}

impl<S: KeyValueStore> Engine<S> {
    pub fn new(store: S, clock: Arc<dyn Clock>, config: EngineConfig) -> Self {
        let state = EngineState {
            tracker: SessionTracker::new(config.min_dwell),
            pending: VecDeque::new(),
            max_pending: config.max_pending_flushes.max(1),
        };
        Self {
            store,
            clock,
            config,
            state: Mutex::new(state),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.time()
    }

    /// Seeds the default categories unless some were already stored.
    pub async fn initialize(&self) -> Result<(), EngineError> {
        let defaults = Categories(self.config.default_categories.clone());
        let seeded = transact(
            &self.store,
            &[Categories::KEY],
            self.config.max_write_attempts,
            |snapshot| {
                if snapshot.contains(Categories::KEY) {
                    return Ok((false, Writes::new()));
                }
                Ok((true, Writes::new().put(&defaults)?))
            },
        )
        .await?;
        if seeded {
            info!("Seeded {} default categories", defaults.0.len());
        }
        Ok(())
    }

    /// Applies a browser event. Session transitions always happen, even if persisting the
    /// resulting flush fails. Such flushes stay queued and are written before anything else on the
    /// next call.
    pub async fn handle_event(&self, event: &BrowserEvent) -> Result<(), EngineError> {
        match event {
            BrowserEvent::ScheduledTick {
                tag: TickTag::DailyAggregation,
            } => self.rollup().await.map(|_| ()),
            BrowserEvent::ScheduledTick {
                tag: TickTag::Checkpoint,
            } => self.checkpoint().await,
            BrowserEvent::ScheduledTick {
                tag: TickTag::Unknown,
            } => {
                debug!("Ignoring tick with an unknown tag");
                Ok(())
            }
            event => {
                let mut state = self.state.lock().await;
                let now = self.clock.time();
                if let Some(flush) = state.tracker.handle(event, now) {
                    state.enqueue(flush);
                }
                self.flush_pending(&mut state).await
            }
        }
    }

    /// Persists the time accrued by the active session without ending it.
    pub async fn checkpoint(&self) -> Result<(), EngineError> {
        let mut state = self.state.lock().await;
        self.checkpoint_locked(&mut state).await
    }

    /// Merges the current period into history. The active session is checkpointed first so its
    /// time is part of the rollup.
    pub async fn rollup(&self) -> Result<RollupReport, EngineError> {
        let mut state = self.state.lock().await;
        let result: Result<RollupReport, EngineError> = async {
            self.checkpoint_locked(&mut state).await?;
            DailyAggregator::new(&self.store, self.config.max_write_attempts)
                .rollup()
                .await
        }
        .await;
        result
            .map_err(EngineError::aggregation_skipped)
            .inspect_err(|e| error!("Rollup failed, current period left intact {e:?}"))
    }

    /// Closes the active session and writes everything still queued.
    pub async fn shutdown(&self) -> Result<(), EngineError> {
        let mut state = self.state.lock().await;
        let now = self.clock.time();
        if let Some(flush) = state.tracker.close(now) {
            state.enqueue(flush);
        }
        self.flush_pending(&mut state).await.inspect_err(|e| {
            error!(
                "Dropping {} unsaved flushes on shutdown {e:?}",
                state.pending.len()
            )
        })
    }

    pub async fn today_summary(&self) -> Result<DailySummary, EngineError> {
        let today = self.today();
        self.refresh(today).await;
        let (period, history) = self.read_days().await?;
        Ok(current_view(&history, &period, today))
    }

    /// Exactly `range_days` days ending today, oldest first. Days without any time are empty.
    pub async fn history(&self, range_days: u32) -> Result<Vec<DailySummary>, EngineError> {
        let today = self.today();
        self.refresh(today).await;
        let (period, history) = self.read_days().await?;
        Ok(days_ending_at(today, range_days)
            .into_iter()
            .map(|date| current_view(&history, &period, date))
            .collect())
    }

    /// Share of the day spent on domains of the work category, from 0 to 100.
    pub async fn productivity_score(&self, date: NaiveDate) -> Result<u8, EngineError> {
        self.refresh(self.today()).await;
        let snapshot = self.store.get(StoreKey::ALL.to_vec()).await?;
        let period = snapshot.decode::<CurrentPeriod>()?;
        let history = snapshot.decode::<History>()?;
        let categories = snapshot.decode::<Categories>()?;

        let summary = current_view(&history, &period, date);
        let work_patterns = categories
            .find(&self.config.work_category)
            .map(|rule| rule.domain_patterns.as_slice())
            .unwrap_or_default();
        Ok(score::score(&summary, work_patterns))
    }

    /// Today's time per category, including uncategorized time.
    pub async fn category_breakdown(&self) -> Result<Vec<CategoryUsage>, EngineError> {
        let summary = self.today_summary().await?;
        let categories = self.categories().await?;
        Ok(time_by_category(&summary, &categories.0))
    }

    /// Rules in evaluation order.
    pub async fn categories(&self) -> Result<Categories, EngineError> {
        let snapshot = self.store.get(vec![StoreKey::Categories]).await?;
        Ok(snapshot.decode()?)
    }

    /// Replaces the rule with the same name in place, or appends a new one.
    pub async fn set_category_rule(
        &self,
        name: &str,
        patterns: &[String],
    ) -> Result<CategoryRule, EngineError> {
        let rule = normalize_rule(name, patterns)?;
        transact(
            &self.store,
            &[Categories::KEY],
            self.config.max_write_attempts,
            |snapshot| {
                let mut categories = snapshot.decode::<Categories>()?;
                categories.upsert(rule.clone());
                Ok(((), Writes::new().put(&categories)?))
            },
        )
        .await?;
        info!("Saved category {} with {:?}", rule.name, rule.domain_patterns);
        Ok(rule)
    }

    /// Wipes all records. Queued flushes are dropped and the active session starts counting anew.
    pub async fn clear_all_data(&self) -> Result<(), EngineError> {
        let mut state = self.state.lock().await;
        self.store.clear().await?;
        state.pending.clear();
        state.tracker.restart(self.clock.time());
        info!("Cleared all data");
        Ok(())
    }

    pub async fn export_all(&self) -> Result<ExportSnapshot, EngineError> {
        let snapshot = self.store.get(StoreKey::ALL.to_vec()).await?;
        Ok(ExportSnapshot {
            exported_at: self.clock.time(),
            site_data: snapshot.decode()?,
            daily_data: snapshot.decode()?,
            categories: snapshot.decode()?,
        })
    }

    pub async fn active_session(&self) -> Option<Session> {
        self.state.lock().await.tracker.active().cloned()
    }

    pub async fn pending_flushes(&self) -> usize {
        self.state.lock().await.pending.len()
    }

    /// The current UTC date, which is the key today's time is stored under.
    pub fn today(&self) -> NaiveDate {
        self.clock.time().date_naive()
    }

    async fn checkpoint_locked(&self, state: &mut EngineState) -> Result<(), EngineError> {
        if let Some(flush) = state.tracker.checkpoint(self.clock.time()) {
            state.enqueue(flush);
        }
        self.flush_pending(state).await
    }

    async fn flush_pending(&self, state: &mut EngineState) -> Result<(), EngineError> {
        let accumulation = AccumulationStore::new(&self.store, self.config.max_write_attempts);
        while let Some(flush) = state.pending.front() {
            accumulation
                .apply(flush, flush.ended_at)
                .await
                .inspect_err(|e| {
                    warn!(
                        "Couldn't persist {} on {}, {} flushes queued {e:?}",
                        flush.elapsed(),
                        flush.domain,
                        state.pending.len()
                    )
                })?;
            state.pending.pop_front();
        }
        Ok(())
    }

    /// Rolls up first if the current period still holds days before `today`, so that they are
    /// never shown as today. A failed rollup only means the view is less up to date.
    async fn refresh(&self, today: NaiveDate) {
        let stale = match AccumulationStore::new(&self.store, self.config.max_write_attempts)
            .snapshot()
            .await
        {
            Ok(period) => period.has_days_before(today),
            Err(e) => {
                warn!("Couldn't check the current period {e:?}");
                false
            }
        };
        if stale {
            debug!("Date advanced since the last rollup");
            if let Err(e) = self.rollup().await {
                warn!("Reading without rolling up {e:?}");
            }
        }
    }

    async fn read_days(&self) -> Result<(CurrentPeriod, History), EngineError> {
        let snapshot = self
            .store
            .get(vec![StoreKey::CurrentPeriod, StoreKey::History])
            .await?;
        Ok((snapshot.decode()?, snapshot.decode()?))
    }
}
