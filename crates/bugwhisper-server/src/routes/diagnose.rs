//! One-shot diagnosis from the dashboard form.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;

use super::ApiError;
use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/diagnose", post(diagnose))
}

#[derive(Debug, Deserialize)]
struct DiagnoseRequest {
    #[serde(default)]
    error: String,
}

/// POST /api/diagnose with `{ "error": "..." }`. Blank input is a 400.
async fn diagnose(
    State(state): State<Arc<AppState>>,
    Json(req): Json<DiagnoseRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let diagnosis = state.orchestrator.diagnose(&req.error).await?;
    Ok(Json(serde_json::json!({
        "severity": diagnosis.severity,
        "color": diagnosis.severity.color(),
        "suggestion": diagnosis.suggestion,
        "source": diagnosis.source,
        "key": diagnosis.key,
        "similarity": diagnosis.similarity,
        "message": diagnosis.message(),
    })))
}
