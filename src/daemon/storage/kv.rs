use std::{collections::HashMap, fmt::Display, sync::Arc};

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

/// Top-level records kept in the store. Names follow the layout written by the browser
/// extension so exported data stays readable by both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StoreKey {
    CurrentPeriod,
    History,
    Categories,
}

impl StoreKey {
    pub const ALL: [StoreKey; 3] = [StoreKey::CurrentPeriod, StoreKey::History, StoreKey::Categories];

    pub fn as_str(self) -> &'static str {
        match self {
            StoreKey::CurrentPeriod => "siteData",
            StoreKey::History => "dailyData",
            StoreKey::Categories => "categories",
        }
    }
}

impl Display for StoreKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store io failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("store file is corrupted: {0}")]
    Corrupted(#[source] serde_json::Error),
    #[error("record {key} does not match its schema: {source}")]
    Schema {
        key: StoreKey,
        #[source]
        source: serde_json::Error,
    },
    #[error("store is unavailable: {0}")]
    Unavailable(String),
}

/// A typed record living under a single [StoreKey]. A missing key decodes to
/// [Default::default], which is the documented zero value of the record.
pub trait Record: Serialize + DeserializeOwned + Default {
    const KEY: StoreKey;
}

/// Values read from the store together with the revision they were read at. The revision is what
/// [KeyValueStore::compare_and_set] checks against.
#[derive(Debug, Clone, Default)]
pub struct StoreSnapshot {
    pub revision: u64,
    pub values: HashMap<StoreKey, Value>,
}

impl StoreSnapshot {
    pub fn contains(&self, key: StoreKey) -> bool {
        matches!(self.values.get(&key), Some(v) if !v.is_null())
    }

    pub fn decode<R: Record>(&self) -> Result<R, StoreError> {
        match self.values.get(&R::KEY) {
            None | Some(Value::Null) => Ok(R::default()),
            Some(value) => R::deserialize(value).map_err(|source| StoreError::Schema {
                key: R::KEY,
                source,
            }),
        }
    }
}

/// Set of values to write back in one store call.
#[derive(Debug, Default)]
pub struct Writes(HashMap<StoreKey, Value>);

impl Writes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put<R: Record>(mut self, record: &R) -> Result<Self, StoreError> {
        let value = serde_json::to_value(record).map_err(|source| StoreError::Schema {
            key: R::KEY,
            source,
        })?;
        self.0.insert(R::KEY, value);
        Ok(self)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> HashMap<StoreKey, Value> {
        self.0
    }
}

/// Persistent key-value store the engine runs on. It offers no transactions; writes that must not
/// be lost go through [KeyValueStore::compare_and_set] with the revision of the snapshot they were
/// computed from.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, keys: Vec<StoreKey>) -> Result<StoreSnapshot, StoreError>;

    /// Unconditionally overwrites the given keys.
    async fn set(&self, entries: HashMap<StoreKey, Value>) -> Result<(), StoreError>;

    /// Writes the entries only if nothing was written since `expected_revision`. Returns whether the
    /// write happened.
    async fn compare_and_set(
        &self,
        expected_revision: u64,
        entries: HashMap<StoreKey, Value>,
    ) -> Result<bool, StoreError>;

    /// Removes every record. Bumps the revision so that stale writers fail their next
    /// compare-and-set.
    async fn clear(&self) -> Result<(), StoreError>;
}

#[async_trait]
impl<T: KeyValueStore + ?Sized> KeyValueStore for Arc<T> {
    async fn get(&self, keys: Vec<StoreKey>) -> Result<StoreSnapshot, StoreError> {
        (**self).get(keys).await
    }

    async fn set(&self, entries: HashMap<StoreKey, Value>) -> Result<(), StoreError> {
        (**self).set(entries).await
    }

    async fn compare_and_set(
        &self,
        expected_revision: u64,
        entries: HashMap<StoreKey, Value>,
    ) -> Result<bool, StoreError> {
        (**self).compare_and_set(expected_revision, entries).await
    }

    async fn clear(&self) -> Result<(), StoreError> {
        (**self).clear().await
    }
}

/// Contents shared by the store implementations: a revision counter plus the raw records.
#[derive(Debug, Default, Serialize, Deserialize)]
pub(crate) struct StoreContents {
    #[serde(default)]
    pub revision: u64,
    #[serde(default)]
    pub records: HashMap<String, Value>,
}

impl StoreContents {
    pub fn snapshot(&self, keys: &[StoreKey]) -> StoreSnapshot {
        StoreSnapshot {
            revision: self.revision,
            values: keys
                .iter()
                .filter_map(|key| self.records.get(key.as_str()).map(|v| (*key, v.clone())))
                .collect(),
        }
    }

    pub fn write(&mut self, entries: HashMap<StoreKey, Value>) {
        self.records
            .extend(entries.into_iter().map(|(key, value)| (key.as_str().to_owned(), value)));
        self.revision += 1;
    }

    pub fn compare_and_write(&mut self, expected_revision: u64, entries: HashMap<StoreKey, Value>) -> bool {
        if self.revision != expected_revision {
            return false;
        }
        self.write(entries);
        true
    }

    pub fn clear(&mut self) {
        self.records.clear();
        self.revision += 1;
    }
}
