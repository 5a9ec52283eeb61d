use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use chrono::Utc;
use fandian_shared::{JoinRequest, ListUpsert, RestaurantList};
use serde_json::{json, Value};

use super::{error::AppError, state::AppState};

pub async fn info_handler(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "backend": state.store.backend_name(),
        "endpoints": {
            "getList": "GET /lists/{id}",
            "saveList": "POST /lists",
            "joinList": "POST /lists/{id}/join",
            "health": "GET /health",
        },
    }))
}

pub async fn health_handler() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "timestamp": Utc::now(),
    }))
}

pub async fn get_list_handler(
    State(state): State<AppState>,
    Path(list_id): Path<String>,
) -> Result<Json<RestaurantList>, AppError> {
    let list = state.store.get(&list_id).await?;
    Ok(Json(list))
}

pub async fn save_list_handler(
    State(state): State<AppState>,
    payload: Result<Json<ListUpsert>, JsonRejection>,
) -> Result<Json<RestaurantList>, AppError> {
    let Json(upsert) = payload?;
    let stored = state.store.put(upsert).await?;
    tracing::debug!(
        list_id = %stored.id,
        "Saved list {:?} ({} restaurants)",
        stored.name,
        stored.restaurants.len()
    );
    Ok(Json(stored))
}

pub async fn join_list_handler(
    State(state): State<AppState>,
    Path(list_id): Path<String>,
    payload: Result<Json<JoinRequest>, JsonRejection>,
) -> Result<Json<RestaurantList>, AppError> {
    let Json(request) = payload?;
    let list = state.store.join(&list_id, &request).await?;
    tracing::info!(list_id = %list.id, user_id = %request.user_id, "Member joined list");
    Ok(Json(list))
}
