//! Sync server: the shared copy of every list, keyed by id.
//!
//! Routes are served both at the root and under `/api`:
//!
//! ```text
//! GET  /                  service info
//! GET  /health            liveness
//! GET  /lists/{id}        200 list | 404
//! POST /lists             upsert by body id, 200 stored list | 400
//! POST /lists/{id}/join   add member (creating the list if absent)
//! ```

pub mod error;
pub mod routes;
pub mod state;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::{
    http::{header::CONTENT_TYPE, Method},
    routing::{get, post},
    Router,
};
use tokio::{net::TcpListener, signal};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::config::ServerConfig;
use crate::storage::RemoteStore;

use routes::{get_list_handler, health_handler, info_handler, join_list_handler, save_list_handler};
use state::AppState;

/// Build the application router around an injected store.
pub fn router(store: Arc<dyn RemoteStore>, cors_max_age: Duration) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .max_age(cors_max_age);

    let api = Router::new()
        .route("/", get(info_handler))
        .route("/health", get(health_handler))
        .route("/lists", post(save_list_handler))
        .route("/lists/{id}", get(get_list_handler))
        .route("/lists/{id}/join", post(join_list_handler));

    Router::new()
        .merge(api.clone())
        .nest("/api", api)
        .layer(cors)
        .with_state(AppState::new(store))
}

/// Bind and serve until Ctrl+C or SIGTERM.
pub async fn serve(config: &ServerConfig, store: Arc<dyn RemoteStore>) -> Result<()> {
    let app = router(store, Duration::from_secs(config.cors_max_age_secs));

    let address = format!("{}:{}", config.host, config.port);
    info!("Binding to {address}");

    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {address}"))?;
    info!("Server running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                tracing::error!("Failed to install Ctrl+C handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                tracing::error!("Failed to install signal handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
