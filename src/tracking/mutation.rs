use tracing::warn;

use crate::daemon::storage::kv::{KeyValueStore, StoreError, StoreKey, StoreSnapshot, Writes};

use super::error::EngineError;

/// Runs a read-modify-write over `keys` as a compare-and-set loop. `apply` computes the output and
/// the records to write from a fresh snapshot, and is called again whenever another writer got in
/// between the read and the write. An empty [Writes] skips the write altogether.
pub async fn transact<S, T, F>(
    store: &S,
    keys: &[StoreKey],
    max_attempts: u32,
    mut apply: F,
) -> Result<T, EngineError>
where
    S: KeyValueStore + ?Sized,
    F: FnMut(&StoreSnapshot) -> Result<(T, Writes), StoreError>,
{
    let attempts = max_attempts.max(1);
    for attempt in 1..=attempts {
        let snapshot = store.get(keys.to_vec()).await?;
        let (output, writes) = apply(&snapshot)?;
        if writes.is_empty() {
            return Ok(output);
        }
        if store
            .compare_and_set(snapshot.revision, writes.into_inner())
            .await?
        {
            return Ok(output);
        }
        warn!("Conflicting write to {keys:?} at revision {}, attempt {attempt}", snapshot.revision);
    }
    Err(EngineError::ConcurrentMutationConflict {
        keys: keys.to_vec(),
        attempts,
    })
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use mockall::predicate::eq;

    use super::transact;
    use crate::{
        daemon::storage::{
            entities::Categories,
            kv::{MockKeyValueStore, StoreKey, StoreSnapshot, Writes},
        },
        tracking::error::EngineError,
    };

    #[tokio::test]
    async fn test_transact_retries_then_gives_up() -> Result<()> {
        let mut store = MockKeyValueStore::new();
        store
            .expect_get()
            .with(eq(vec![StoreKey::Categories]))
            .times(3)
            .returning(|_| Ok(StoreSnapshot::default()));
        store
            .expect_compare_and_set()
            .times(3)
            .returning(|_, _| Ok(false));

        let mut calls = 0;
        let result = transact(&store, &[StoreKey::Categories], 3, |snapshot| {
            calls += 1;
            let categories = snapshot.decode::<Categories>()?;
            Ok(((), Writes::new().put(&categories)?))
        })
        .await;

        assert_eq!(calls, 3);
        assert!(matches!(
            result,
            Err(EngineError::ConcurrentMutationConflict { attempts: 3, .. })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_transact_without_writes_only_reads() -> Result<()> {
        let mut store = MockKeyValueStore::new();
        store
            .expect_get()
            .times(1)
            .returning(|_| Ok(StoreSnapshot::default()));
        store.expect_compare_and_set().never();

        let value = transact(&store, &[StoreKey::History], 5, |_| Ok((7, Writes::new()))).await?;

        assert_eq!(value, 7);
        Ok(())
    }
}
