//! Cached analysis lookup and bulk clear.

use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::json;
use tracing::info;

use super::super::error::ApiError;
use super::super::AppState;
use crate::models::AnalysisResult;

pub async fn get_analysis(
    State(state): State<AppState>,
    Path(file_id): Path<String>,
) -> Result<Json<AnalysisResult>, ApiError> {
    state
        .cache
        .get(&file_id)
        .await
        .map(|entry| Json(entry.analysis))
        .ok_or_else(|| ApiError::not_found("Analysis not found"))
}

/// Drop every cached analysis and its stored upload.
pub async fn clear_analyses(State(state): State<AppState>) -> Json<serde_json::Value> {
    let removed = state.cache.clear().await;
    info!("Cleared {} cached analyses", removed);
    Json(json!({ "removed": removed }))
}
