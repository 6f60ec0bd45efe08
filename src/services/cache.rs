//! In-memory store of completed analyses and export jobs.
//!
//! One exclusive lock guards the entries, the content-hash index and the
//! export table, so inserts, dedup lookups, bulk clears and retention sweeps
//! never interleave.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{watch, Mutex};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::{CacheEntry, ExportTask};

#[derive(Default)]
struct CacheState {
    entries: HashMap<String, CacheEntry>,
    /// SHA-256 hex -> file_id
    by_hash: HashMap<String, String>,
    /// Hashes being analyzed right now. The receiver closes when the
    /// claiming upload finishes, successfully or not.
    in_flight: HashMap<String, watch::Receiver<()>>,
    exports: HashMap<Uuid, ExportTask>,
}

impl CacheState {
    fn remove_entry(&mut self, file_id: &str) -> Option<CacheEntry> {
        let entry = self.entries.remove(file_id)?;
        if self.by_hash.get(&entry.file_hash).map(String::as_str) == Some(file_id) {
            self.by_hash.remove(&entry.file_hash);
        }
        Some(entry)
    }
}

/// Result of [`AnalysisCache::claim_hash`].
pub enum HashClaim {
    /// Identical bytes were already analyzed.
    Cached(CacheEntry),
    /// The caller owns this hash until the lease drops.
    Claimed(HashLease),
}

/// Exclusive right to analyze one content hash.
///
/// Uploads of the same bytes wait on the lease and re-check the cache once
/// it is dropped.
pub struct HashLease {
    _done: watch::Sender<()>,
}

/// Outcome of one retention sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Entries evicted from the cache.
    pub removed: usize,
    /// Evicted entries whose file was already gone.
    pub missing_files: usize,
    /// Expired entries kept because their file could not be deleted.
    pub failed: usize,
}

#[derive(Default)]
pub struct AnalysisCache {
    state: Mutex<CacheState>,
}

impl AnalysisCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an entry.
    pub async fn insert(&self, entry: CacheEntry) {
        let mut state = self.state.lock().await;
        state.remove_entry(&entry.file_id);
        state.in_flight.remove(&entry.file_hash);
        state
            .by_hash
            .insert(entry.file_hash.clone(), entry.file_id.clone());
        debug!("Cached analysis {}", entry.file_id);
        state.entries.insert(entry.file_id.clone(), entry);
    }

    pub async fn get(&self, file_id: &str) -> Option<CacheEntry> {
        self.state.lock().await.entries.get(file_id).cloned()
    }

    /// Entry whose uploaded bytes hash to `file_hash`, if any.
    pub async fn find_by_hash(&self, file_hash: &str) -> Option<CacheEntry> {
        let state = self.state.lock().await;
        state
            .by_hash
            .get(file_hash)
            .and_then(|id| state.entries.get(id))
            .cloned()
    }

    /// Look up `file_hash`, or claim it for analysis.
    ///
    /// The lookup and the claim happen under one lock. While another upload
    /// holds the claim this waits for it to finish, then looks again.
    pub async fn claim_hash(&self, file_hash: &str) -> HashClaim {
        loop {
            let mut waiting = {
                let mut state = self.state.lock().await;
                if let Some(entry) = state
                    .by_hash
                    .get(file_hash)
                    .and_then(|id| state.entries.get(id))
                {
                    return HashClaim::Cached(entry.clone());
                }
                // A closed channel means the holder gave up without caching.
                let holder = state
                    .in_flight
                    .get(file_hash)
                    .filter(|rx| rx.has_changed().is_ok())
                    .cloned();
                match holder {
                    Some(rx) => rx,
                    None => {
                        let (tx, rx) = watch::channel(());
                        state.in_flight.insert(file_hash.to_string(), rx);
                        return HashClaim::Claimed(HashLease { _done: tx });
                    }
                }
            };
            debug!("Waiting on in-flight analysis of {}", file_hash);
            // Nothing is ever sent; this returns once the lease drops.
            let _ = waiting.changed().await;
        }
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Remove every entry and delete its backing file. Returns the number of
    /// entries removed.
    pub async fn clear(&self) -> usize {
        let mut state = self.state.lock().await;
        let entries: Vec<CacheEntry> = state.entries.drain().map(|(_, e)| e).collect();
        state.by_hash.clear();
        state.in_flight.clear();
        for entry in &entries {
            if let Err(e) = remove_backing_file(&entry.file_path).await {
                warn!(
                    "Failed to delete {} for {}: {}",
                    entry.file_path.display(),
                    entry.file_id,
                    e
                );
            }
        }
        entries.len()
    }

    /// Evict entries created before `cutoff`, deleting their files.
    ///
    /// Works over a snapshot of the expired ids. A file that is already gone
    /// counts as deleted; any other deletion failure keeps the entry for the
    /// next sweep.
    pub async fn sweep(&self, cutoff: DateTime<Utc>) -> SweepReport {
        let mut state = self.state.lock().await;
        let expired: Vec<(String, std::path::PathBuf)> = state
            .entries
            .values()
            .filter(|e| e.created_at < cutoff)
            .map(|e| (e.file_id.clone(), e.file_path.clone()))
            .collect();

        let mut report = SweepReport::default();
        for (file_id, path) in expired {
            match remove_backing_file(&path).await {
                Ok(existed) => {
                    if !existed {
                        report.missing_files += 1;
                    }
                    state.remove_entry(&file_id);
                    report.removed += 1;
                    debug!("Evicted expired analysis {}", file_id);
                }
                Err(e) => {
                    report.failed += 1;
                    warn!("Failed to delete {} for {}: {}", path.display(), file_id, e);
                }
            }
        }
        report
    }

    pub async fn create_export(&self, task: ExportTask) {
        self.state.lock().await.exports.insert(task.task_id, task);
    }

    /// Apply `update` to an export task, returning the updated copy.
    pub async fn update_export<F>(&self, task_id: Uuid, update: F) -> Option<ExportTask>
    where
        F: FnOnce(&mut ExportTask),
    {
        let mut state = self.state.lock().await;
        let task = state.exports.get_mut(&task_id)?;
        update(task);
        Some(task.clone())
    }

    pub async fn get_export(&self, task_id: Uuid) -> Option<ExportTask> {
        self.state.lock().await.exports.get(&task_id).cloned()
    }

    pub async fn export_len(&self) -> usize {
        self.state.lock().await.exports.len()
    }
}

/// Delete a file, reporting whether it existed.
async fn remove_backing_file(path: &Path) -> std::io::Result<bool> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::entry;
    use super::*;
    use crate::models::{ExportFormat, ExportStatus};
    use chrono::Duration;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_insert_get_and_hash_lookup() {
        let cache = AnalysisCache::new();
        let now = Utc::now();
        cache.insert(entry("a", "h1", "/nonexistent/a".into(), now)).await;

        assert_eq!(cache.get("a").await.unwrap().file_hash, "h1");
        assert_eq!(cache.find_by_hash("h1").await.unwrap().file_id, "a");
        assert!(cache.find_by_hash("h2").await.is_none());

        // Replacing an entry drops its old hash mapping.
        cache.insert(entry("a", "h2", "/nonexistent/a".into(), now)).await;
        assert!(cache.find_by_hash("h1").await.is_none());
        assert_eq!(cache.find_by_hash("h2").await.unwrap().file_id, "a");
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_claim_hash_waits_for_holder_then_sees_entry() {
        let cache = std::sync::Arc::new(AnalysisCache::new());
        let lease = match cache.claim_hash("h1").await {
            HashClaim::Claimed(lease) => lease,
            HashClaim::Cached(_) => panic!("empty cache has nothing for h1"),
        };

        let waiter = tokio::spawn({
            let cache = cache.clone();
            async move { cache.claim_hash("h1").await }
        });
        tokio::time::sleep(std::time::Duration::from_millis(30)).await;
        assert!(!waiter.is_finished());

        cache
            .insert(entry("a", "h1", "/nonexistent/a".into(), Utc::now()))
            .await;
        drop(lease);

        match waiter.await.unwrap() {
            HashClaim::Cached(found) => assert_eq!(found.file_id, "a"),
            HashClaim::Claimed(_) => panic!("second claim should see the cached entry"),
        }
    }

    #[tokio::test]
    async fn test_abandoned_claim_passes_to_next_upload() {
        let cache = std::sync::Arc::new(AnalysisCache::new());
        let lease = match cache.claim_hash("h1").await {
            HashClaim::Claimed(lease) => lease,
            HashClaim::Cached(_) => panic!("empty cache has nothing for h1"),
        };
        let waiter = tokio::spawn({
            let cache = cache.clone();
            async move { cache.claim_hash("h1").await }
        });
        tokio::time::sleep(std::time::Duration::from_millis(30)).await;
        drop(lease);

        assert!(matches!(waiter.await.unwrap(), HashClaim::Claimed(_)));
        // Other hashes are never blocked.
        assert!(matches!(cache.claim_hash("h2").await, HashClaim::Claimed(_)));
    }

    #[tokio::test]
    async fn test_sweep_respects_cutoff_and_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let now = Utc::now();
        let old_path = dir.path().join("old.pdf");
        let new_path = dir.path().join("new.pdf");
        std::fs::write(&old_path, b"old").unwrap();
        std::fs::write(&new_path, b"new").unwrap();

        let cache = AnalysisCache::new();
        cache
            .insert(entry("old", "h-old", old_path.clone(), now - Duration::hours(25)))
            .await;
        cache
            .insert(entry("new", "h-new", new_path.clone(), now - Duration::hours(1)))
            .await;
        cache
            .insert(entry("gone", "h-gone", dir.path().join("gone.pdf"), now - Duration::hours(48)))
            .await;

        let report = cache.sweep(now - Duration::hours(24)).await;
        assert_eq!(report.removed, 2);
        assert_eq!(report.missing_files, 1);
        assert_eq!(report.failed, 0);
        assert!(!old_path.exists());
        assert!(new_path.exists());
        assert!(cache.get("old").await.is_none());
        assert!(cache.find_by_hash("h-old").await.is_none());
        assert!(cache.get("new").await.is_some());

        let again = cache.sweep(now - Duration::hours(24)).await;
        assert_eq!(again, SweepReport::default());
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_entry_at_cutoff_is_kept() {
        let cache = AnalysisCache::new();
        let cutoff = Utc::now();
        cache.insert(entry("edge", "h", "/nonexistent/edge".into(), cutoff)).await;
        assert_eq!(cache.sweep(cutoff).await.removed, 0);
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_clear_deletes_files() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.png");
        std::fs::write(&path, b"x").unwrap();

        let cache = AnalysisCache::new();
        cache.insert(entry("a", "h1", path.clone(), Utc::now())).await;
        cache
            .insert(entry("b", "h2", dir.path().join("missing.png"), Utc::now()))
            .await;

        assert_eq!(cache.clear().await, 2);
        assert!(!path.exists());
        assert!(cache.is_empty().await);
        assert!(cache.find_by_hash("h1").await.is_none());
        assert_eq!(cache.clear().await, 0);
    }

    #[tokio::test]
    async fn test_export_tasks() {
        let cache = AnalysisCache::new();
        let task = ExportTask::new("a".into(), ExportFormat::Json);
        let id = task.task_id;
        cache.create_export(task).await;
        assert_eq!(cache.get_export(id).await.unwrap().status, ExportStatus::Processing);

        let updated = cache
            .update_export(id, |t| {
                t.status = ExportStatus::Completed;
                t.file_path = Some("/tmp/out.json".into());
            })
            .await
            .unwrap();
        assert_eq!(updated.status, ExportStatus::Completed);
        assert_eq!(cache.export_len().await, 1);
        assert!(cache.update_export(Uuid::new_v4(), |_| {}).await.is_none());
    }
}
