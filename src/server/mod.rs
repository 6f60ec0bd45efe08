//! HTTP API for uploading, analyzing and exporting legal documents.
//!
//! - `/analyze` runs an upload through the pipeline
//! - `/analysis`, `/documents` read back cached results and uploads
//! - `/export`, `/exports` render reports in the background

mod error;
mod handlers;
mod request_id;
mod routes;

pub use error::{ApiError, GENERIC_MESSAGE};
pub use routes::create_router;

use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use crate::config::Settings;
use crate::services::{AnalysisCache, ExportService, PipelineCoordinator, RetentionManager};

/// Shared state for the web server.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<PipelineCoordinator>,
    pub cache: Arc<AnalysisCache>,
    pub exports: ExportService,
    /// Root that `/documents` responses are confined to.
    pub storage_dir: PathBuf,
    pub max_file_size: u64,
}

impl AppState {
    pub fn new(pipeline: Arc<PipelineCoordinator>, exports: ExportService) -> Self {
        Self {
            cache: pipeline.cache().clone(),
            storage_dir: pipeline.storage_dir().to_path_buf(),
            max_file_size: pipeline.validator().max_file_size(),
            pipeline,
            exports,
        }
    }

    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let cache = Arc::new(AnalysisCache::new());
        let pipeline = PipelineCoordinator::from_settings(settings, cache.clone())?;
        let exports = ExportService::new(cache, settings.exports_dir.clone());
        Ok(Self::new(Arc::new(pipeline), exports))
    }
}

/// Start the web server and run until Ctrl-C.
pub async fn serve(settings: &Settings) -> anyhow::Result<()> {
    settings.ensure_directories()?;
    let state = AppState::from_settings(settings)?;

    let retention = RetentionManager::new(
        state.cache.clone(),
        settings.cleanup_interval,
        settings.cache_retention,
    )
    .start();

    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(settings.bind.as_str()).await?;
    info!("Starting server at http://{}", listener.local_addr()?);

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    retention.stop().await;
    info!("Server stopped");
    served?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}
