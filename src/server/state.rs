use std::sync::Arc;

use crate::storage::RemoteStore;

/// Shared by every handler. The store is injected at start-up.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn RemoteStore>,
}

impl AppState {
    pub fn new(store: Arc<dyn RemoteStore>) -> Self {
        Self { store }
    }
}
