use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::{tracking::domain::Domain, utils::time::saturating_add};

use super::kv::{Record, StoreKey};

/// Running totals of one domain. Used both for the not yet aggregated period and for days in
/// history.
#[derive(PartialEq, Eq, Debug, Serialize, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct SiteTimeEntry {
    #[serde(with = "duration_ms")]
    pub total_time: Duration,
    pub visits: u32,
    #[serde(with = "chrono::serde::ts_milliseconds", default)]
    pub last_visit: DateTime<Utc>,
}

impl SiteTimeEntry {
    pub fn add(&mut self, elapsed: Duration, visits: u32, at: DateTime<Utc>) {
        self.total_time = saturating_add(self.total_time, elapsed);
        self.visits = self.visits.saturating_add(visits);
        self.last_visit = self.last_visit.max(at);
    }

    pub fn merge(&mut self, other: &SiteTimeEntry) {
        self.add(other.total_time, other.visits, other.last_visit);
    }
}

/// Time not yet rolled into [History]. Bucketed by the UTC date the time was spent on, so that
/// aggregation never depends on the date it happens to run at.
#[derive(PartialEq, Eq, Debug, Serialize, Deserialize, Clone, Default)]
#[serde(transparent)]
pub struct CurrentPeriod(pub BTreeMap<NaiveDate, BTreeMap<Domain, SiteTimeEntry>>);

impl Record for CurrentPeriod {
    const KEY: StoreKey = StoreKey::CurrentPeriod;
}

impl CurrentPeriod {
    pub fn is_empty(&self) -> bool {
        self.0.values().all(BTreeMap::is_empty)
    }

    pub fn entry(&mut self, date: NaiveDate, domain: &Domain) -> &mut SiteTimeEntry {
        self.0
            .entry(date)
            .or_default()
            .entry(domain.clone())
            .or_default()
    }

    pub fn day(&self, date: NaiveDate) -> Option<&BTreeMap<Domain, SiteTimeEntry>> {
        self.0.get(&date)
    }

    /// Per domain totals regardless of the day they belong to.
    pub fn totals(&self) -> BTreeMap<Domain, SiteTimeEntry> {
        let mut totals = BTreeMap::<Domain, SiteTimeEntry>::new();
        for sites in self.0.values() {
            for (domain, entry) in sites {
                totals.entry(domain.clone()).or_default().merge(entry);
            }
        }
        totals
    }

    pub fn total_time(&self) -> Duration {
        self.0
            .values()
            .flat_map(BTreeMap::values)
            .fold(Duration::zero(), |sum, v| saturating_add(sum, v.total_time))
    }

    /// Whether any time is still waiting for a day that is already over.
    pub fn has_days_before(&self, date: NaiveDate) -> bool {
        self.0
            .iter()
            .any(|(day, sites)| *day < date && !sites.is_empty())
    }
}

#[derive(PartialEq, Eq, Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct DailySummary {
    pub date: NaiveDate,
    #[serde(with = "duration_ms")]
    pub total_time: Duration,
    pub sites: BTreeMap<Domain, SiteTimeEntry>,
}

impl DailySummary {
    pub fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            total_time: Duration::zero(),
            sites: BTreeMap::new(),
        }
    }

    pub fn merge_site(&mut self, domain: &Domain, entry: &SiteTimeEntry) {
        self.sites.entry(domain.clone()).or_default().merge(entry);
        self.total_time = saturating_add(self.total_time, entry.total_time);
    }

    /// Sites ordered from the most to the least time spent.
    pub fn ranked_sites(&self) -> Vec<(&Domain, &SiteTimeEntry)> {
        let mut sites = self.sites.iter().collect::<Vec<_>>();
        sites.sort_by(|a, b| b.1.total_time.cmp(&a.1.total_time).then(a.0.cmp(b.0)));
        sites
    }
}

/// Aggregated days. Append only, a day is only rewritten by an explicit clear.
#[derive(PartialEq, Eq, Debug, Serialize, Deserialize, Clone, Default)]
#[serde(transparent)]
pub struct History(pub BTreeMap<NaiveDate, DailySummary>);

impl Record for History {
    const KEY: StoreKey = StoreKey::History;
}

impl History {
    pub fn day_mut(&mut self, date: NaiveDate) -> &mut DailySummary {
        self.0
            .entry(date)
            .or_insert_with(|| DailySummary::empty(date))
    }

    pub fn day(&self, date: NaiveDate) -> Option<&DailySummary> {
        self.0.get(&date)
    }
}

#[derive(PartialEq, Eq, Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CategoryRule {
    pub name: String,
    pub domain_patterns: Vec<String>,
}

impl CategoryRule {
    pub fn new(name: impl Into<String>, patterns: &[&str]) -> Self {
        Self {
            name: name.into(),
            domain_patterns: patterns.iter().map(|v| v.to_string()).collect(),
        }
    }
}

/// Category rules in evaluation order.
#[derive(PartialEq, Eq, Debug, Serialize, Deserialize, Clone, Default)]
#[serde(transparent)]
pub struct Categories(pub Vec<CategoryRule>);

impl Record for Categories {
    const KEY: StoreKey = StoreKey::Categories;
}

impl Categories {
    pub fn find(&self, name: &str) -> Option<&CategoryRule> {
        self.0.iter().find(|rule| rule.name == name)
    }

    /// Replaces the rule with the same name in place or appends a new one at the end.
    pub fn upsert(&mut self, rule: CategoryRule) {
        match self.0.iter_mut().find(|v| v.name == rule.name) {
            Some(existing) => *existing = rule,
            None => self.0.push(rule),
        }
    }
}

/// Everything the store holds, in a form that can be written out as a single document.
#[derive(PartialEq, Eq, Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ExportSnapshot {
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub exported_at: DateTime<Utc>,
    pub site_data: CurrentPeriod,
    pub daily_data: History,
    pub categories: Categories,
}

mod duration_ms {
    use chrono::Duration;
    use serde::{self, de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_i64(duration.num_milliseconds())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let ms = i64::deserialize(deserializer)?;
        if ms < 0 {
            return Err(D::Error::custom(format!("negative duration {ms}ms")));
        }
        Duration::try_milliseconds(ms)
            .ok_or_else(|| D::Error::custom(format!("duration {ms}ms is out of range")))
    }
}
