//! Remote list storage for fandian.
//!
//! - [`MemoryStore`]: process-lifetime map, injected into the server (default for tests)
//! - [`FileStore`]: one JSON document keyed by list id
//! - [`KvStore`]: redb key-value database, one record per list
//! - [`HttpStore`]: client for a running sync server
//!
//! The sync engine and the HTTP handlers hold an `Arc<dyn RemoteStore>`;
//! every write is a whole-record overwrite and the last write to land wins.

pub mod file;
pub mod http;
pub mod kv;
pub mod memory;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use fandian_shared::{JoinRequest, ListUpsert, RestaurantList, ValidationError};
use thiserror::Error;

use crate::config::{BackendKind, ServerConfig, StorageConfig};

pub use file::FileStore;
pub use http::HttpStore;
pub use kv::KvStore;
pub use memory::MemoryStore;

/// Failure talking to a remote store.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The list id has never been written.
    #[error("list {0} not found")]
    NotFound(String),

    /// Transport failure; worth retrying later.
    #[error("network failure: {0}")]
    Network(String),

    #[error("invalid list: {0}")]
    Invalid(#[from] ValidationError),

    /// A remote server refused the write as invalid.
    #[error("rejected by server: {0}")]
    Rejected(String),

    #[error("storage backend error: {0:#}")]
    Backend(#[from] anyhow::Error),
}

/// Shared, id-addressed list storage.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Human-readable backend name (e.g., "memory", "file").
    fn backend_name(&self) -> &str;

    /// Fetch a list by id.
    async fn get(&self, list_id: &str) -> Result<RestaurantList, RemoteError>;

    /// Overwrite (or create) the list named by `upsert.id`, returning what was stored.
    async fn put(&self, upsert: ListUpsert) -> Result<RestaurantList, RemoteError>;

    /// Add a member to a list, creating an empty shared list if it is absent.
    async fn join(&self, list_id: &str, request: &JoinRequest)
        -> Result<RestaurantList, RemoteError>;
}

/// Pick the id a put writes to: the body's own or a fresh one.
pub(crate) fn target_id(upsert: &ListUpsert) -> String {
    upsert
        .target_id()
        .map(str::to_string)
        .unwrap_or_else(crate::ids::new_id)
}

/// Open the backend the server is configured for.
pub fn open_server_store(
    server: &ServerConfig,
    storage: &StorageConfig,
) -> Result<Arc<dyn RemoteStore>> {
    let store: Arc<dyn RemoteStore> = match server.backend {
        BackendKind::Memory => Arc::new(MemoryStore::new()),
        BackendKind::File => Arc::new(FileStore::open(&server.resolve_data_file(storage)?)?),
        BackendKind::Kv => Arc::new(KvStore::open(&server.resolve_data_file(storage)?)?),
    };
    tracing::info!("Using {} list storage", store.backend_name());
    Ok(store)
}
