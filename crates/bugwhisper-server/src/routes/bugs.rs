//! Recent bug reports.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use bugwhisper_core::Error;
use bugwhisper_store::BugRecord;
use serde::Deserialize;

use super::ApiError;
use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/bugs", get(list_bugs))
        .route("/bugs/{key}", get(get_bug))
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    limit: Option<usize>,
}

/// GET /api/bugs?limit=n, most recent first, embeddings omitted.
async fn list_bugs(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let limit = query.limit.unwrap_or(state.config.recent_limit);
    let bugs = state.store().list_recent(limit)?;
    let total = state.store().count()?;
    Ok(Json(serde_json::json!({
        "bugs": bugs,
        "total": total,
    })))
}

/// GET /api/bugs/{key}
async fn get_bug(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> Result<Json<BugRecord>, ApiError> {
    state
        .store()
        .get(&key)?
        .map(Json)
        .ok_or_else(|| Error::NotFound(key).into())
}
