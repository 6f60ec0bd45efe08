//! JSON error responses.

use std::fmt::Display;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::{error, warn};
use uuid::Uuid;

use super::request_id;
use crate::services::{PipelineError, ReportError};

pub const GENERIC_MESSAGE: &str = "An unexpected error occurred. Please try again later.";

/// An error returned to HTTP clients as `{error, message, status_code, request_id}`.
#[derive(Debug, Serialize)]
pub struct ApiError {
    #[serde(skip)]
    status: StatusCode,
    error: &'static str,
    message: String,
    status_code: u16,
    request_id: Uuid,
}

impl ApiError {
    fn new(status: StatusCode, error: &'static str, message: impl Into<String>) -> Self {
        let message = message.into();
        let request_id = request_id::current();
        warn!(%request_id, status = status.as_u16(), "{}", message);
        Self {
            status,
            error,
            message,
            status_code: status.as_u16(),
            request_id,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "Request Failed", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "Request Failed", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, "Request Failed", message)
    }

    /// A processing failure whose reason is safe to show.
    pub fn processing(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Request Failed", message)
    }

    /// An internal failure. The detail is logged, never returned.
    pub fn internal(detail: impl Display) -> Self {
        let request_id = request_id::current();
        error!(%request_id, "Unhandled error: {}", detail);
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            error: "Internal Server Error",
            message: GENERIC_MESSAGE.to_string(),
            status_code: StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
            request_id,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

impl From<PipelineError> for ApiError {
    fn from(e: PipelineError) -> Self {
        match e {
            PipelineError::Validation(_) | PipelineError::Upload(_) => {
                Self::bad_request(e.to_string())
            }
            PipelineError::Extraction(_) | PipelineError::Timeout(_) => {
                Self::processing(e.to_string())
            }
            PipelineError::Io(_) | PipelineError::Internal(_) => Self::internal(e),
        }
    }
}

impl From<ReportError> for ApiError {
    fn from(e: ReportError) -> Self {
        match e {
            ReportError::NotFound(_) => Self::not_found("Analysis not found or expired"),
            other => Self::internal(other),
        }
    }
}
