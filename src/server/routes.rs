//! Router configuration for the web server.

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{delete, get, post},
    Router,
};
use tower_http::cors::CorsLayer;

use super::handlers;
use super::request_id::request_id_middleware;
use super::AppState;

/// Headroom above the upload limit for multipart framing.
const BODY_LIMIT_HEADROOM: usize = 1024 * 1024;

/// Create the main router with all routes.
pub fn create_router(state: AppState) -> Router {
    let body_limit = usize::try_from(state.max_file_size)
        .unwrap_or(usize::MAX)
        .saturating_add(BODY_LIMIT_HEADROOM);

    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route("/stats", get(handlers::stats))
        .route("/supported-formats", get(handlers::supported_formats))
        // Analysis
        .route("/analyze", post(handlers::analyze_document))
        .route("/analysis", delete(handlers::clear_analyses))
        .route("/analysis/:file_id", get(handlers::get_analysis))
        .route("/documents/:file_id", get(handlers::get_document))
        // Exports
        .route("/export/:file_id/:format", post(handlers::export_analysis))
        .route("/exports/:task_id", get(handlers::export_status))
        .route("/exports/:task_id/download", get(handlers::download_export))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
