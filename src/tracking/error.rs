use crate::daemon::storage::kv::{StoreError, StoreKey};

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Never fatal, the url is simply not tracked.
    #[error("url {0:?} is not trackable")]
    InvalidUrl(String),
    /// The operation did not persist anything. Deltas stay queued in memory for the next attempt.
    #[error(transparent)]
    StoreUnavailable(#[from] StoreError),
    #[error("gave up writing {keys:?} after {attempts} conflicting attempts")]
    ConcurrentMutationConflict { keys: Vec<StoreKey>, attempts: u32 },
    /// The current period was left untouched.
    #[error("aggregation skipped: {0}")]
    AggregationSkipped(#[source] Box<EngineError>),
    #[error("invalid category rule: {0}")]
    InvalidCategoryRule(String),
}

impl EngineError {
    pub fn aggregation_skipped(cause: EngineError) -> Self {
        match cause {
            v @ EngineError::AggregationSkipped(_) => v,
            v => EngineError::AggregationSkipped(Box::new(v)),
        }
    }
}
