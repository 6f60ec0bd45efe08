//! Document upload and analysis.

use std::sync::Arc;

use axum::{
    extract::{Multipart, State},
    Json,
};
use tracing::{debug, info};

use super::super::error::ApiError;
use super::super::{request_id, AppState};
use crate::services::{AnalysisResponse, PipelineCoordinator, UploadMeta};

/// Analyze the multipart field `file`.
///
/// An optional text field `document_type`, sent before `file`, names the
/// document type used when the model does not report one. The upload is
/// processed in its own task so a client disconnect does not abandon an
/// analysis halfway through.
pub async fn analyze_document(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<AnalysisResponse>, ApiError> {
    let pipeline = state.pipeline.clone();
    let task = tokio::spawn(request_id::scoped(run_upload(pipeline, multipart)));

    match task.await {
        Ok(result) => result.map(Json),
        Err(e) => Err(ApiError::internal(format!("analysis task failed: {}", e))),
    }
}

async fn run_upload(
    pipeline: Arc<PipelineCoordinator>,
    mut multipart: Multipart,
) -> Result<AnalysisResponse, ApiError> {
    let mut document_type = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Invalid multipart body: {}", e)))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("document_type") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("Invalid document_type: {}", e)))?;
                let text = text.trim();
                if !text.is_empty() {
                    document_type = Some(text.to_string());
                }
            }
            Some("file") => {
                let meta = UploadMeta {
                    filename: field.file_name().map(str::to_string),
                    content_type: field.content_type().map(str::to_string),
                    document_type,
                };
                info!(
                    filename = meta.filename.as_deref().unwrap_or("<unnamed>"),
                    content_type = meta.content_type.as_deref().unwrap_or("<none>"),
                    "Analysis request received"
                );
                let response = pipeline.analyze_upload(meta, field).await?;
                info!(
                    file_id = %response.file_id,
                    deduplicated = response.deduplicated,
                    clauses = response.analysis.key_clauses.len(),
                    "Analysis completed in {:.2}s",
                    response.processing_time
                );
                return Ok(response);
            }
            other => debug!("Ignoring multipart field {:?}", other),
        }
    }

    Err(ApiError::bad_request("Missing multipart field 'file'"))
}
