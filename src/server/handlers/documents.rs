//! Original upload download.

use axum::{
    extract::{Path, State},
    response::Response,
};
use tracing::warn;
use uuid::Uuid;

use super::super::error::ApiError;
use super::super::AppState;
use super::helpers::stream_file;

/// Stream the stored upload behind a cached analysis.
///
/// The id must be a UUID and the stored path must resolve inside the
/// storage directory.
pub async fn get_document(
    State(state): State<AppState>,
    Path(file_id): Path<String>,
) -> Result<Response, ApiError> {
    if Uuid::parse_str(&file_id).is_err() {
        return Err(ApiError::bad_request("Invalid document id"));
    }
    let entry = state
        .cache
        .get(&file_id)
        .await
        .ok_or_else(|| ApiError::not_found("Document not found or expired"))?;

    let canonical_root = state
        .storage_dir
        .canonicalize()
        .map_err(ApiError::internal)?;
    let canonical_file = entry
        .file_path
        .canonicalize()
        .map_err(|_| ApiError::not_found("Original document file not found"))?;

    if !canonical_file.starts_with(&canonical_root) {
        warn!(
            file_id = %file_id,
            "Refusing to serve {} outside storage",
            canonical_file.display()
        );
        return Err(ApiError::not_found("Original document file not found"));
    }

    stream_file(
        &canonical_file,
        &entry.content_type,
        &entry.original_filename,
    )
    .await
}
