//! In-memory list storage.
//!
//! Lives as long as the process that constructs it. The server builds one at
//! start-up and hands it to the request handlers; nothing global.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;
use fandian_shared::{JoinRequest, ListUpsert, RestaurantList};

use super::{target_id, RemoteError, RemoteStore};

#[derive(Default)]
pub struct MemoryStore {
    lists: RwLock<HashMap<String, RestaurantList>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lists.read().map(|l| l.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned<E: std::fmt::Display>(e: E) -> RemoteError {
    RemoteError::Backend(anyhow::anyhow!("lock poisoned: {e}"))
}

#[async_trait]
impl RemoteStore for MemoryStore {
    fn backend_name(&self) -> &str {
        "memory"
    }

    async fn get(&self, list_id: &str) -> Result<RestaurantList, RemoteError> {
        let lists = self.lists.read().map_err(poisoned)?;
        lists
            .get(list_id)
            .cloned()
            .ok_or_else(|| RemoteError::NotFound(list_id.to_string()))
    }

    async fn put(&self, upsert: ListUpsert) -> Result<RestaurantList, RemoteError> {
        let id = target_id(&upsert);
        let mut lists = self.lists.write().map_err(poisoned)?;
        let stored = upsert.resolve(id.clone(), lists.get(&id), Utc::now())?;
        lists.insert(id, stored.clone());
        Ok(stored)
    }

    async fn join(
        &self,
        list_id: &str,
        request: &JoinRequest,
    ) -> Result<RestaurantList, RemoteError> {
        let mut lists = self.lists.write().map_err(poisoned)?;
        let existing = lists.get(list_id).cloned();
        let (list, changed) = fandian_shared::join(list_id, existing, request, Utc::now())?;
        if changed {
            lists.insert(list_id.to_string(), list.clone());
        }
        Ok(list)
    }
}
