//! Report export endpoints.

use axum::{
    extract::{Path, State},
    response::Response,
    Json,
};
use serde_json::json;
use uuid::Uuid;

use super::super::error::ApiError;
use super::super::AppState;
use super::helpers::stream_file;
use crate::models::{ExportFormat, ExportStatus, ExportTask};

/// Queue a JSON or PDF export of a cached analysis.
pub async fn export_analysis(
    State(state): State<AppState>,
    Path((file_id, format)): Path<(String, String)>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if state.cache.get(&file_id).await.is_none() {
        return Err(ApiError::not_found("Analysis not found or expired"));
    }
    let format = ExportFormat::from_str(&format)
        .ok_or_else(|| ApiError::bad_request("Unsupported format. Use 'json' or 'pdf'"))?;

    let task = state.exports.enqueue(&file_id, format).await?;
    Ok(Json(json!({
        "task_id": task.task_id,
        "status": task.status.as_str(),
    })))
}

async fn find_task(state: &AppState, task_id: &str) -> Result<ExportTask, ApiError> {
    let id = Uuid::parse_str(task_id).map_err(|_| ApiError::not_found("Export task not found"))?;
    state
        .cache
        .get_export(id)
        .await
        .ok_or_else(|| ApiError::not_found("Export task not found"))
}

pub async fn export_status(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Result<Json<ExportTask>, ApiError> {
    find_task(&state, &task_id).await.map(Json)
}

/// Stream a finished export artifact.
pub async fn download_export(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Result<Response, ApiError> {
    let task = find_task(&state, &task_id).await?;
    match (task.status, task.file_path) {
        (ExportStatus::Completed, Some(path)) => {
            let name = path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("export")
                .to_string();
            stream_file(&path, task.format.content_type(), &name).await
        }
        (ExportStatus::Processing, _) => Err(ApiError::conflict("Export is still processing")),
        _ => Err(ApiError::not_found("Export failed or artifact unavailable")),
    }
}
