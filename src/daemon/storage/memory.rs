use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use super::kv::{KeyValueStore, StoreContents, StoreError, StoreKey, StoreSnapshot};

/// Volatile [KeyValueStore]. Same revision semantics as the file store, nothing survives the
/// process.
#[derive(Default)]
pub struct MemoryStore {
    contents: Mutex<StoreContents>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, keys: Vec<StoreKey>) -> Result<StoreSnapshot, StoreError> {
        Ok(self.contents.lock().await.snapshot(&keys))
    }

    async fn set(&self, entries: HashMap<StoreKey, Value>) -> Result<(), StoreError> {
        self.contents.lock().await.write(entries);
        Ok(())
    }

    async fn compare_and_set(
        &self,
        expected_revision: u64,
        entries: HashMap<StoreKey, Value>,
    ) -> Result<bool, StoreError> {
        Ok(self
            .contents
            .lock()
            .await
            .compare_and_write(expected_revision, entries))
    }

    async fn clear(&self) -> Result<(), StoreError> {
        self.contents.lock().await.clear();
        Ok(())
    }
}
