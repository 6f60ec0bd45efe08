//! Service info, health and capacity endpoints.

use axum::{extract::State, Json};
use chrono::Utc;
use serde::Serialize;
use serde_json::json;

use super::super::AppState;
use crate::services::SupportedFormats;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Service info and endpoint list.
pub async fn root() -> Json<serde_json::Value> {
    Json(json!({
        "name": "Legalyzer",
        "version": VERSION,
        "description": "Legal document analysis with clause extraction and reporting",
        "status": "active",
        "timestamp": Utc::now().to_rfc3339(),
        "endpoints": {
            "health": "/health",
            "stats": "/stats",
            "analyze": "/analyze",
            "analysis": "/analysis/{file_id}",
            "export": "/export/{file_id}/{format}",
            "export_status": "/exports/{task_id}",
            "export_download": "/exports/{task_id}/download",
            "documents": "/documents/{file_id}",
            "supported_formats": "/supported-formats",
        }
    }))
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: String,
    pub version: &'static str,
    pub cache_size: usize,
    pub active_analyses: usize,
    pub available_slots: usize,
    pub ocr_available: bool,
    pub pdf_tools_available: bool,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let extractor = state.pipeline.extractor();
    Json(HealthResponse {
        status: "healthy",
        timestamp: Utc::now().to_rfc3339(),
        version: VERSION,
        cache_size: state.cache.len().await,
        active_analyses: state.pipeline.active(),
        available_slots: state.pipeline.available(),
        ocr_available: extractor.ocr_available(),
        pdf_tools_available: extractor.pdf_available(),
    })
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub analysis_cache_size: usize,
    pub export_tasks_size: usize,
    pub max_concurrent_analyses: usize,
    pub active_analyses: usize,
    pub available_slots: usize,
}

pub async fn stats(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse {
        analysis_cache_size: state.cache.len().await,
        export_tasks_size: state.cache.export_len().await,
        max_concurrent_analyses: state.pipeline.max_concurrent(),
        active_analyses: state.pipeline.active(),
        available_slots: state.pipeline.available(),
    })
}

pub async fn supported_formats(State(state): State<AppState>) -> Json<SupportedFormats> {
    Json(state.pipeline.validator().supported_formats())
}
