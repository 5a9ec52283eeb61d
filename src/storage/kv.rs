//! Key-value list storage backed by redb.
//!
//! ```text
//! lists:  list_id  →  JSON RestaurantList
//! ```
//!
//! Puts and joins read and write the record inside one write transaction,
//! so a single record is never half-written. Concurrent writers to the same
//! id are serialized by redb and the last commit wins.

use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use fandian_shared::{JoinRequest, ListUpsert, RestaurantList};
use redb::{Database, ReadableTable, ReadableTableMetadata, TableDefinition};

use super::{target_id, RemoteError, RemoteStore};

const LISTS: TableDefinition<&str, &[u8]> = TableDefinition::new("lists");

pub struct KvStore {
    db: Database,
}

impl KvStore {
    /// Open or create the database at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let db = Database::create(path)
            .with_context(|| format!("failed to create redb at {}", path.display()))?;
        // Ensure table exists
        let txn = db.begin_write()?;
        { let _ = txn.open_table(LISTS)?; }
        txn.commit()?;
        Ok(Self { db })
    }

    /// Number of stored lists.
    pub fn list_count(&self) -> Result<u64> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(LISTS)?;
        Ok(table.len()?)
    }

    fn decode(list_id: &str, bytes: &[u8]) -> Result<RestaurantList> {
        serde_json::from_slice(bytes)
            .with_context(|| format!("corrupt list record {list_id} in redb"))
    }

    fn modify<T>(
        &self,
        list_id: &str,
        f: impl FnOnce(Option<RestaurantList>) -> Result<(T, Option<RestaurantList>), RemoteError>,
    ) -> Result<T, RemoteError> {
        let txn = self.db.begin_write().map_err(anyhow::Error::from)?;
        let out = {
            let mut table = txn.open_table(LISTS).map_err(anyhow::Error::from)?;
            let existing = table
                .get(list_id)
                .map_err(anyhow::Error::from)?
                .map(|data| Self::decode(list_id, data.value()))
                .transpose()?;
            let (out, write) = f(existing)?;
            if let Some(list) = write {
                let data = serde_json::to_vec(&list).map_err(anyhow::Error::from)?;
                table
                    .insert(list_id, data.as_slice())
                    .map_err(anyhow::Error::from)?;
            }
            out
        };
        txn.commit().map_err(anyhow::Error::from)?;
        Ok(out)
    }
}

#[async_trait]
impl RemoteStore for KvStore {
    fn backend_name(&self) -> &str {
        "kv"
    }

    async fn get(&self, list_id: &str) -> Result<RestaurantList, RemoteError> {
        let txn = self.db.begin_read().map_err(anyhow::Error::from)?;
        let table = txn.open_table(LISTS).map_err(anyhow::Error::from)?;
        match table.get(list_id).map_err(anyhow::Error::from)? {
            Some(data) => Ok(Self::decode(list_id, data.value())?),
            None => Err(RemoteError::NotFound(list_id.to_string())),
        }
    }

    async fn put(&self, upsert: ListUpsert) -> Result<RestaurantList, RemoteError> {
        let id = target_id(&upsert);
        self.modify(&id, |existing| {
            let stored = upsert.resolve(id.clone(), existing.as_ref(), Utc::now())?;
            let write = (existing.as_ref() != Some(&stored)).then(|| stored.clone());
            Ok((stored, write))
        })
    }

    async fn join(
        &self,
        list_id: &str,
        request: &JoinRequest,
    ) -> Result<RestaurantList, RemoteError> {
        self.modify(list_id, |existing| {
            let (list, changed) = fandian_shared::join(list_id, existing, request, Utc::now())?;
            let write = changed.then(|| list.clone());
            Ok((list, write))
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::storage::contract;

    fn open_store() -> (tempfile::TempDir, KvStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = KvStore::open(&dir.path().join("server-db.redb")).unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn test_kv_store_contract() {
        let (_dir, store) = open_store();
        contract::run_all(&store).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_puts_keep_one_payload() {
        let (_dir, store) = open_store();
        contract::concurrent_puts_store_one_payload(Arc::new(store)).await;
    }

    #[tokio::test]
    async fn test_one_record_per_list() {
        let (_dir, store) = open_store();
        store.put(contract::sample_list("a", &["X"]).into()).await.unwrap();
        store.put(contract::sample_list("b", &["Y"]).into()).await.unwrap();
        store.put(contract::sample_list("a", &["Z"]).into()).await.unwrap();

        assert_eq!(store.list_count().unwrap(), 2);
        assert_eq!(store.get("a").await.unwrap().restaurants[0].name, "Z");
        assert_eq!(store.get("b").await.unwrap().restaurants[0].name, "Y");
    }

    #[tokio::test]
    async fn test_rejected_put_leaves_record_untouched() {
        let (_dir, store) = open_store();
        let original = store
            .put(contract::sample_list("a", &["X"]).into())
            .await
            .unwrap();

        let mut bad = contract::sample_list("a", &["Y"]);
        bad.restaurants[0].name.clear();
        assert!(matches!(
            store.put(bad.into()).await,
            Err(RemoteError::Invalid(_))
        ));
        assert_eq!(store.get("a").await.unwrap(), original);
    }
}
