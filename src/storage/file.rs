//! Single-file JSON list storage.
//!
//! ```text
//! server-db.json  →  { "<list id>": <RestaurantList>, ... }
//! ```
//!
//! Each write re-reads the document, swaps one record and replaces the file.
//! Writers inside this process are serialized so updates to different lists
//! never clobber each other; two writes to the same list still race, and the
//! later one wins in full.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use fandian_shared::{JoinRequest, ListUpsert, RestaurantList};

use super::{target_id, RemoteError, RemoteStore};

type Document = BTreeMap<String, RestaurantList>;

pub struct FileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStore {
    /// Open the document at `path`, creating an empty one if it does not exist.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let store = Self {
            path: path.to_path_buf(),
            write_lock: Mutex::new(()),
        };
        if !path.exists() {
            store.write(&Document::new())?;
        }
        Ok(store)
    }

    fn read(&self) -> Result<Document> {
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Corrupt list document {}", self.path.display()))
    }

    fn write(&self, doc: &Document) -> Result<()> {
        let contents = serde_json::to_string_pretty(doc)
            .context("Failed to serialize list document")?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, contents)
            .context("Failed to write list document")?;
        fs::rename(&tmp, &self.path)
            .context("Failed to replace list document")?;
        Ok(())
    }

    fn modify<T>(
        &self,
        f: impl FnOnce(&mut Document) -> Result<(T, bool), RemoteError>,
    ) -> Result<T, RemoteError> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|e| anyhow::anyhow!("lock poisoned: {e}"))?;
        let mut doc = self.read()?;
        let (out, dirty) = f(&mut doc)?;
        if dirty {
            self.write(&doc)?;
        }
        Ok(out)
    }
}

#[async_trait]
impl RemoteStore for FileStore {
    fn backend_name(&self) -> &str {
        "file"
    }

    async fn get(&self, list_id: &str) -> Result<RestaurantList, RemoteError> {
        self.read()?
            .remove(list_id)
            .ok_or_else(|| RemoteError::NotFound(list_id.to_string()))
    }

    async fn put(&self, upsert: ListUpsert) -> Result<RestaurantList, RemoteError> {
        let id = target_id(&upsert);
        self.modify(|doc| {
            let stored = upsert.resolve(id.clone(), doc.get(&id), Utc::now())?;
            let dirty = doc.get(&id) != Some(&stored);
            doc.insert(id, stored.clone());
            Ok((stored, dirty))
        })
    }

    async fn join(
        &self,
        list_id: &str,
        request: &JoinRequest,
    ) -> Result<RestaurantList, RemoteError> {
        self.modify(|doc| {
            let existing = doc.get(list_id).cloned();
            let (list, changed) = fandian_shared::join(list_id, existing, request, Utc::now())?;
            if changed {
                doc.insert(list_id.to_string(), list.clone());
            }
            Ok((list, changed))
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::storage::contract;

    #[tokio::test]
    async fn test_file_store_contract() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(&dir.path().join("server-db.json")).unwrap();
        contract::run_all(&store).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_puts_keep_one_payload() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(&dir.path().join("server-db.json")).unwrap();
        contract::concurrent_puts_store_one_payload(Arc::new(store)).await;

        // The document on disk is still one well-formed record
        let reopened = FileStore::open(&dir.path().join("server-db.json")).unwrap();
        assert!(reopened.get("race").await.is_ok());
    }

    #[tokio::test]
    async fn test_lists_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("server-db.json");
        let list = contract::sample_list("l1", &["A", "B"]);

        let stored = {
            let store = FileStore::open(&path).unwrap();
            store.put(list.into()).await.unwrap()
        };

        let reopened = FileStore::open(&path).unwrap();
        assert_eq!(reopened.get("l1").await.unwrap(), stored);
    }

    #[tokio::test]
    async fn test_document_is_keyed_by_list_id() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("server-db.json");
        let store = FileStore::open(&path).unwrap();
        store.put(contract::sample_list("l1", &["A"]).into()).await.unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["l1"]["id"], "l1");
        assert_eq!(raw["l1"]["restaurants"][0]["name"], "A");
    }

    #[tokio::test]
    async fn test_corrupt_document_is_an_error_not_a_wipe() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("server-db.json");
        let store = FileStore::open(&path).unwrap();
        fs::write(&path, "garbage").unwrap();

        assert!(matches!(store.get("l1").await, Err(RemoteError::Backend(_))));
        assert!(store.put(contract::sample_list("l1", &[]).into()).await.is_err());
        assert_eq!(fs::read_to_string(&path).unwrap(), "garbage");
    }
}
