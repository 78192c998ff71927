//! Store and pipeline statistics.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};

use super::ApiError;
use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/stats", get(get_stats))
}

/// GET /api/stats
async fn get_stats(State(state): State<Arc<AppState>>) -> Result<Json<serde_json::Value>, ApiError> {
    let store_stats = state.store().get_stats()?;
    let stream_len = state.store().stream_len(&state.config.stream_name)?;
    let orchestrator = &state.orchestrator;

    Ok(Json(serde_json::json!({
        "bugs": store_stats.total_bugs,
        "streamEntries": stream_len,
        "stream": state.config.stream_name,
        "embeddingDimension": store_stats.embedding_dimension,
        "dbSizeMb": store_stats.db_size_mb,
        "matrixRows": store_stats.matrix_rows,
        "similarityThreshold": orchestrator.threshold(),
        "matchStrategy": orchestrator.strategy().to_string(),
        "embedder": orchestrator.embedder().name(),
        "explainerAvailable": orchestrator.explainer().is_available(),
    })))
}
