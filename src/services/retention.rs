//! Periodic eviction of expired analyses and their uploaded files.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::cache::{AnalysisCache, SweepReport};

pub const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(3600);
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(24 * 3600);

pub struct RetentionManager {
    cache: Arc<AnalysisCache>,
    interval: Duration,
    retention: Duration,
}

/// A running sweeper. Dropping the handle leaves the task running until
/// the runtime shuts down; call [`RetentionHandle::stop`] to end it.
pub struct RetentionHandle {
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl RetentionHandle {
    /// Signal the sweeper and wait for it to exit.
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.task.await {
            warn!("Retention task ended abnormally: {}", e);
        }
    }
}

impl RetentionManager {
    pub fn new(cache: Arc<AnalysisCache>, interval: Duration, retention: Duration) -> Self {
        Self {
            cache,
            interval,
            retention,
        }
    }

    /// Evict everything older than the retention window, once.
    pub async fn run_once(&self) -> SweepReport {
        let window = chrono::Duration::from_std(self.retention).unwrap_or(chrono::Duration::MAX);
        let cutoff = Utc::now()
            .checked_sub_signed(window)
            .unwrap_or(chrono::DateTime::<Utc>::MIN_UTC);
        let report = self.cache.sweep(cutoff).await;
        if report.removed > 0 || report.failed > 0 {
            info!(
                removed = report.removed,
                missing = report.missing_files,
                failed = report.failed,
                "Retention sweep completed"
            );
        }
        report
    }

    /// Spawn the sweep loop: sleep one interval, sweep, repeat.
    pub fn start(self) -> RetentionHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        info!(
            interval_secs = self.interval.as_secs(),
            retention_secs = self.retention.as_secs(),
            "Retention manager started"
        );

        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                    _ = tokio::time::sleep(self.interval) => {
                        self.run_once().await;
                    }
                }
            }
            info!("Retention manager stopped");
        });

        RetentionHandle { shutdown_tx, task }
    }
}
