//! Polling reconciliation between the local store and a remote store.
//!
//! While a list is selected, [`SyncEngine::spawn`] runs one tick right away
//! and then one per interval. Each tick fetches the remote copy, hands both
//! copies to [`reconcile`] and applies the decision:
//!
//! - remote says "not found": push the local list up,
//! - remote differs: overwrite the local name, restaurants and members,
//! - anything else (equal, timeout, network error): nothing, retry next tick.
//!
//! Failures never leave the tick; they are logged and the loop carries on.

use std::sync::Arc;
use std::time::Duration;

use fandian_shared::{reconcile, RestaurantList, SyncDecision};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{timeout, MissedTickBehavior};

use crate::config::SyncConfig;
use crate::local_store::LocalStore;
use crate::storage::{RemoteError, RemoteStore};

/// What a single tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Remote had never seen the list; local copy pushed.
    UpSynced,
    /// Remote copy replaced the local name, restaurants and members.
    DownSynced,
    /// Both sides already agreed (or there is no local copy).
    Unchanged,
    /// Fetch or push failed or timed out; try again next tick.
    Skipped,
    /// The selection moved on while the fetch was in flight; result dropped.
    Discarded,
}

pub struct SyncEngine {
    local: Arc<LocalStore>,
    remote: Arc<dyn RemoteStore>,
    interval: Duration,
    request_timeout: Duration,
}

impl SyncEngine {
    pub fn new(local: Arc<LocalStore>, remote: Arc<dyn RemoteStore>, config: &SyncConfig) -> Self {
        Self {
            local,
            remote,
            interval: config.interval(),
            request_timeout: config.request_timeout(),
        }
    }

    /// Reconcile `list_id` once.
    pub async fn tick(&self, list_id: &str) -> SyncOutcome {
        self.tick_guarded(list_id, || true).await
    }

    /// Reconcile once, dropping the fetched result if `still_selected` turns false
    /// while the fetch was in flight.
    async fn tick_guarded(&self, list_id: &str, still_selected: impl Fn() -> bool) -> SyncOutcome {
        let remote = match timeout(self.request_timeout, self.remote.get(list_id)).await {
            Err(_) => {
                tracing::warn!(list_id = %list_id, "Sync fetch timed out after {:?}", self.request_timeout);
                return SyncOutcome::Skipped;
            }
            Ok(Ok(list)) => Some(list),
            Ok(Err(RemoteError::NotFound(_))) => None,
            Ok(Err(e)) => {
                tracing::debug!(list_id = %list_id, "Sync fetch failed: {}", e);
                return SyncOutcome::Skipped;
            }
        };

        if !still_selected() {
            tracing::debug!(list_id = %list_id, "Selection changed during fetch, dropping result");
            return SyncOutcome::Discarded;
        }

        // Read local state only now so edits made during the fetch are compared
        let local = self.local.get(list_id);

        match reconcile(local.as_ref(), remote.as_ref()) {
            SyncDecision::UpSync(list) => self.push(list).await,
            SyncDecision::DownSync(list) => {
                let count = list.restaurants.len();
                match self.local.upsert_list(list) {
                    Ok(()) => {
                        tracing::info!(list_id = %list_id, "⟳ List synced from remote ({} restaurants)", count);
                        SyncOutcome::DownSynced
                    }
                    Err(e) => {
                        tracing::warn!(list_id = %list_id, "Could not persist remote list: {:#}", e);
                        SyncOutcome::Skipped
                    }
                }
            }
            SyncDecision::NoOp => SyncOutcome::Unchanged,
        }
    }

    async fn push(&self, list: RestaurantList) -> SyncOutcome {
        let list_id = list.id.clone();
        match timeout(self.request_timeout, self.remote.put(list.into())).await {
            Ok(Ok(_)) => {
                tracing::info!(list_id = %list_id, "List not found remotely, pushed local copy");
                SyncOutcome::UpSynced
            }
            Ok(Err(e)) => {
                tracing::warn!(list_id = %list_id, "Up-sync failed: {}", e);
                SyncOutcome::Skipped
            }
            Err(_) => {
                tracing::warn!(list_id = %list_id, "Up-sync timed out after {:?}", self.request_timeout);
                SyncOutcome::Skipped
            }
        }
    }

    /// Start the polling loop, observing `selected` first.
    pub fn spawn(self: Arc<Self>, selected: Option<String>) -> SyncHandle {
        let (tx, rx) = watch::channel(selected);
        let task = tokio::spawn(self.run(rx));
        SyncHandle { selection: tx, task }
    }

    async fn run(self: Arc<Self>, mut selection: watch::Receiver<Option<String>>) {
        let guard = selection.clone();

        loop {
            let current = selection.borrow_and_update().clone();
            let Some(list_id) = current else {
                // Nothing selected: no timer until something is
                if selection.changed().await.is_err() {
                    return;
                }
                continue;
            };

            // First tick of a fresh interval fires immediately
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let outcome = self
                            .tick_guarded(&list_id, || {
                                guard.borrow().as_deref() == Some(list_id.as_str())
                            })
                            .await;
                        tracing::trace!(list_id = %list_id, ?outcome, "sync tick");
                    }
                    changed = selection.changed() => {
                        if changed.is_err() {
                            return;
                        }
                        break;
                    }
                }
            }
        }
    }
}

/// Controls a running sync loop.
pub struct SyncHandle {
    selection: watch::Sender<Option<String>>,
    task: JoinHandle<()>,
}

impl SyncHandle {
    /// Switch the observed list. Triggers an immediate tick; `None` pauses polling.
    pub fn select(&self, list_id: Option<String>) {
        self.selection.send_replace(list_id);
    }

    pub fn selected(&self) -> Option<String> {
        self.selection.borrow().clone()
    }

    /// Stop polling. A tick already in flight is allowed to finish.
    pub async fn stop(self) {
        drop(self.selection);
        if let Err(e) = self.task.await {
            tracing::warn!("Sync loop ended abnormally: {}", e);
        }
    }
}
