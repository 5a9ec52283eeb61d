//! List operations as the user sees them.
//!
//! Each edit lands in the [`LocalStore`] first. When a remote store is
//! configured the affected list is then pushed in full; a failed push is
//! logged and otherwise ignored, and the sync loop catches up later.
//! Deleting a whole list stays local.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use fandian_shared::{
    JoinRequest, Restaurant, RestaurantDraft, RestaurantList, RestaurantPatch,
};
use tokio::time::timeout;

use crate::local_store::LocalStore;
use crate::storage::RemoteStore;

pub struct ListService {
    local: Arc<LocalStore>,
    remote: Option<Arc<dyn RemoteStore>>,
    push_timeout: Duration,
}

impl ListService {
    pub fn new(
        local: Arc<LocalStore>,
        remote: Option<Arc<dyn RemoteStore>>,
        push_timeout: Duration,
    ) -> Self {
        Self {
            local,
            remote,
            push_timeout,
        }
    }

    pub fn local(&self) -> &Arc<LocalStore> {
        &self.local
    }

    pub fn lists(&self) -> Vec<RestaurantList> {
        self.local.get_all()
    }

    pub fn list(&self, list_id: &str) -> Option<RestaurantList> {
        self.local.get(list_id)
    }

    pub async fn create_list(&self, name: &str) -> Result<RestaurantList> {
        let list = self.local.create(name)?;
        self.push(&list).await;
        Ok(list)
    }

    /// Add a restaurant; `None` when the list does not exist.
    pub async fn add_restaurant(
        &self,
        list_id: &str,
        draft: RestaurantDraft,
    ) -> Result<Option<Restaurant>> {
        let lists = self.local.add_restaurant(list_id, draft)?;
        let Some(list) = lists.into_iter().find(|l| l.id == list_id) else {
            return Ok(None);
        };
        self.push(&list).await;
        Ok(list.restaurants.last().cloned())
    }

    /// Merge `patch` onto a restaurant; `None` when either id is unknown.
    pub async fn update_restaurant(
        &self,
        list_id: &str,
        restaurant_id: &str,
        patch: RestaurantPatch,
    ) -> Result<Option<Restaurant>> {
        let lists = self.local.update(list_id, restaurant_id, patch)?;
        let Some(list) = lists.into_iter().find(|l| l.id == list_id) else {
            return Ok(None);
        };
        let Some(updated) = list.restaurant(restaurant_id).cloned() else {
            return Ok(None);
        };
        self.push(&list).await;
        Ok(Some(updated))
    }

    /// Flip the `excluded` flag, returning its new value.
    pub async fn toggle_excluded(&self, list_id: &str, restaurant_id: &str) -> Result<Option<bool>> {
        let Some(current) = self
            .local
            .get(list_id)
            .and_then(|l| l.restaurant(restaurant_id).map(|r| r.excluded))
        else {
            return Ok(None);
        };
        let updated = self
            .update_restaurant(list_id, restaurant_id, RestaurantPatch::excluded(!current))
            .await?;
        Ok(updated.map(|r| r.excluded))
    }

    /// Remove a restaurant; `false` when nothing matched.
    pub async fn delete_restaurant(&self, list_id: &str, restaurant_id: &str) -> Result<bool> {
        let existed = self
            .local
            .get(list_id)
            .is_some_and(|l| l.restaurant(restaurant_id).is_some());
        if !existed {
            return Ok(false);
        }
        let lists = self.local.delete(list_id, restaurant_id)?;
        if let Some(list) = lists.iter().find(|l| l.id == list_id) {
            self.push(list).await;
        }
        Ok(true)
    }

    /// Remove a list from this device only; the shared copy is left as is.
    pub fn delete_list(&self, list_id: &str) -> Result<bool> {
        let before = self.local.get_all().len();
        let after = self.local.delete_list(list_id)?.len();
        Ok(after != before)
    }

    /// Join a shared list and store the result locally.
    ///
    /// Unlike background sync this is user-initiated, so failures are returned.
    pub async fn join_shared(&self, list_id: &str, request: &JoinRequest) -> Result<RestaurantList> {
        let remote = self
            .remote
            .as_ref()
            .context("No sync server configured; cannot join a shared list")?;
        let list = timeout(self.push_timeout, remote.join(list_id, request))
            .await
            .context("Join request timed out")?
            .with_context(|| format!("Failed to join list {list_id}"))?;
        self.local.upsert_list(list.clone())?;
        tracing::info!(list_id, "Joined shared list {:?}", list.name);
        Ok(list)
    }

    async fn push(&self, list: &RestaurantList) {
        let Some(remote) = &self.remote else {
            return;
        };
        tracing::debug!(
            "Syncing to backend: {} ({} restaurants)",
            list.name,
            list.restaurants.len()
        );
        match timeout(self.push_timeout, remote.put(list.clone().into())).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => tracing::warn!("Sync failed for list {}: {}", list.id, e),
            Err(_) => tracing::warn!("Sync timed out for list {}", list.id),
        }
    }
}

/// Invitation link for `list`: `<base>?listId=<id>&action=join`.
pub fn share_link(base_url: &str, list: &RestaurantList) -> String {
    format!(
        "{}/?listId={}&action=join",
        base_url.trim_end_matches('/'),
        urlencoding::encode(&list.id)
    )
}
