use std::{
    collections::HashMap,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use fs4::tokio::AsyncFileExt;
use serde_json::Value;
use tokio::fs::{self, File};
use tracing::{debug, trace};

use super::kv::{KeyValueStore, StoreContents, StoreError, StoreKey, StoreSnapshot};

/// The main realization of [KeyValueStore]. Every record lives in a single JSON document, so a
/// multi-key write lands all at once. The daemon and the cli run as separate processes against the
/// same file, which is why access goes through an advisory lock on a sibling `.lock` file and
/// writes replace the document through a rename.
pub struct JsonFileStore {
    path: PathBuf,
    lock_path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: PathBuf) -> Result<Self, std::io::Error> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let lock_path = path.with_extension("lock");
        Ok(Self { path, lock_path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn open_lock(&self) -> Result<File, StoreError> {
        Ok(File::options()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.lock_path)
            .await?)
    }

    async fn load(&self) -> Result<StoreContents, StoreError> {
        match fs::read_to_string(&self.path).await {
            Ok(text) if text.trim().is_empty() => Ok(StoreContents::default()),
            Ok(text) => serde_json::from_str(&text).map_err(StoreError::Corrupted),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(StoreContents::default()),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, contents: &StoreContents) -> Result<(), StoreError> {
        let buffer = serde_json::to_vec(contents).map_err(StoreError::Corrupted)?;
        let temporary = self.path.with_extension("json.tmp");
        fs::write(&temporary, &buffer).await?;
        fs::rename(&temporary, &self.path).await?;
        trace!("Saved store revision {} to {:?}", contents.revision, self.path);
        Ok(())
    }

    async fn read_locked(&self) -> Result<StoreContents, StoreError> {
        let lock = self.open_lock().await?;
        lock.lock_shared()?;
        let result = self.load().await;
        lock.unlock_async().await?;
        result
    }

    /// Semi-safe acquire-release around a read-modify-write of the whole document.
    async fn modify_locked<T>(
        &self,
        modify: impl FnOnce(&mut StoreContents) -> (T, bool),
    ) -> Result<T, StoreError> {
        let lock = self.open_lock().await?;
        lock.lock_exclusive()?;
        let result: Result<T, StoreError> = async {
            let mut contents = self.load().await?;
            let (output, dirty) = modify(&mut contents);
            if dirty {
                self.save(&contents).await?;
            }
            Ok(output)
        }
        .await;
        lock.unlock_async().await?;
        result
    }
}

#[async_trait]
impl KeyValueStore for JsonFileStore {
    async fn get(&self, keys: Vec<StoreKey>) -> Result<StoreSnapshot, StoreError> {
        debug!("Reading {keys:?} from {:?}", self.path);
        Ok(self.read_locked().await?.snapshot(&keys))
    }

    async fn set(&self, entries: HashMap<StoreKey, Value>) -> Result<(), StoreError> {
        self.modify_locked(|contents| {
            contents.write(entries);
            ((), true)
        })
        .await
    }

    async fn compare_and_set(
        &self,
        expected_revision: u64,
        entries: HashMap<StoreKey, Value>,
    ) -> Result<bool, StoreError> {
        self.modify_locked(|contents| {
            let written = contents.compare_and_write(expected_revision, entries);
            (written, written)
        })
        .await
    }

    async fn clear(&self) -> Result<(), StoreError> {
        self.modify_locked(|contents| {
            contents.clear();
            ((), true)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use anyhow::Result;
    use serde_json::json;
    use tempfile::tempdir;

    use super::JsonFileStore;
    use crate::daemon::storage::kv::{KeyValueStore, StoreError, StoreKey};

    #[tokio::test]
    async fn test_file_store_missing_file_is_empty() -> Result<()> {
        let dir = tempdir()?;
        let store = JsonFileStore::new(dir.path().join("store.json"))?;

        let snapshot = store.get(StoreKey::ALL.to_vec()).await?;

        assert_eq!(snapshot.revision, 0);
        assert!(snapshot.values.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_file_store_persists_between_instances() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("nested").join("store.json");
        {
            let store = JsonFileStore::new(path.clone())?;
            store
                .set(HashMap::from([
                    (StoreKey::Categories, json!([{"name": "work", "domainPatterns": ["git"]}])),
                    (StoreKey::CurrentPeriod, json!({})),
                ]))
                .await?;
        }

        let store = JsonFileStore::new(path)?;
        let snapshot = store.get(vec![StoreKey::Categories]).await?;

        assert_eq!(snapshot.revision, 1);
        assert_eq!(
            snapshot.values[&StoreKey::Categories],
            json!([{"name": "work", "domainPatterns": ["git"]}])
        );
        assert!(!snapshot.values.contains_key(&StoreKey::CurrentPeriod));
        Ok(())
    }

    #[tokio::test]
    async fn test_file_store_compare_and_set() -> Result<()> {
        let dir = tempdir()?;
        let store = JsonFileStore::new(dir.path().join("store.json"))?;
        let stale = store.get(vec![StoreKey::History]).await?;

        assert!(
            store
                .compare_and_set(stale.revision, HashMap::from([(StoreKey::History, json!({}))]))
                .await?
        );
        assert!(
            !store
                .compare_and_set(stale.revision, HashMap::from([(StoreKey::History, json!(1))]))
                .await?
        );

        let current = store.get(vec![StoreKey::History]).await?;
        assert_eq!(current.values[&StoreKey::History], json!({}));

        store.clear().await?;
        let cleared = store.get(vec![StoreKey::History]).await?;
        assert!(cleared.values.is_empty());
        assert_eq!(cleared.revision, current.revision + 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_file_store_corrupted_document() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("store.json");
        std::fs::write(&path, "{\"revision\": 3, \"records\": ")?;
        let store = JsonFileStore::new(path)?;

        let result = store.get(vec![StoreKey::History]).await;

        assert!(matches!(result, Err(StoreError::Corrupted(_))));
        Ok(())
    }
}
