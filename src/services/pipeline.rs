//! The analyze flow: validate, store, dedupe, extract, analyze, cache.
//!
//! A counting semaphore bounds how many uploads are inside the flow at once.
//! Stages run strictly in sequence for one upload.

use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use chrono::Utc;
use futures::{Stream, StreamExt};
use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::io::ReaderStream;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::analysis::AnalysisOrchestrator;
use super::cache::{AnalysisCache, HashClaim};
use super::validation::{FileValidator, SNIFF_LEN};
use crate::config::Settings;
use crate::llm::build_provider;
use crate::models::{AnalysisResult, CacheEntry, ValidationResult};
use crate::ocr::{PopplerReader, TesseractBackend, TextExtractor};
use crate::utils::mime::guess_content_type;

pub const DEFAULT_MAX_CONCURRENT_ANALYSES: usize = 5;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// The upload was rejected; the message is safe to show the client.
    #[error("File validation failed: {0}")]
    Validation(String),

    #[error("Upload interrupted: {0}")]
    Upload(String),

    #[error("Document processing failed: {0}")]
    Extraction(String),

    #[error("Analysis timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// What the client told us about an upload.
#[derive(Debug, Clone, Default)]
pub struct UploadMeta {
    pub filename: Option<String>,
    pub content_type: Option<String>,
    /// Optional document type used when the model does not name one.
    pub document_type: Option<String>,
}

/// Analysis plus upload metadata, as returned to clients.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisResponse {
    #[serde(flatten)]
    pub analysis: AnalysisResult,
    pub file_id: String,
    pub processing_time: f64,
    pub total_pages: u32,
    pub word_count: usize,
    pub processing_notes: Vec<String>,
    /// True when an identical upload was already analyzed.
    pub deduplicated: bool,
}

impl AnalysisResponse {
    fn from_entry(entry: CacheEntry, processing_time: f64, deduplicated: bool) -> Self {
        Self {
            analysis: entry.analysis,
            file_id: entry.file_id,
            processing_time,
            total_pages: entry.total_pages,
            word_count: entry.word_count,
            processing_notes: entry.processing_notes,
            deduplicated,
        }
    }
}

/// A stored upload that is deleted on drop unless kept.
///
/// Covers early returns and timeouts that drop the in-flight future.
struct StoredUpload {
    path: PathBuf,
    keep: bool,
}

impl StoredUpload {
    fn keep(mut self) -> PathBuf {
        self.keep = true;
        std::mem::take(&mut self.path)
    }
}

impl Drop for StoredUpload {
    fn drop(&mut self) {
        if self.keep {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!("Removed {}", self.path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove {}: {}", self.path.display(), e),
        }
    }
}

pub struct PipelineCoordinator {
    gate: Arc<Semaphore>,
    max_concurrent: usize,
    validator: FileValidator,
    extractor: Arc<TextExtractor>,
    orchestrator: Arc<AnalysisOrchestrator>,
    cache: Arc<AnalysisCache>,
    storage_dir: PathBuf,
    timeout: Option<Duration>,
}

impl PipelineCoordinator {
    pub fn new(
        validator: FileValidator,
        extractor: Arc<TextExtractor>,
        orchestrator: Arc<AnalysisOrchestrator>,
        cache: Arc<AnalysisCache>,
        storage_dir: PathBuf,
        max_concurrent: usize,
    ) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            gate: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
            validator,
            extractor,
            orchestrator,
            cache,
            storage_dir,
            timeout: None,
        }
    }

    /// Wire the production extractor and provider from resolved settings.
    pub fn from_settings(
        settings: &Settings,
        cache: Arc<AnalysisCache>,
    ) -> Result<Self, PipelineError> {
        let provider =
            build_provider(&settings.llm).map_err(|e| PipelineError::Internal(e.to_string()))?;
        let extractor = TextExtractor::new(
            Arc::new(PopplerReader::new()),
            Arc::new(TesseractBackend::new(&settings.ocr_language)),
        )
        .with_min_chars(settings.min_chars_per_page);
        let orchestrator = AnalysisOrchestrator::new(provider, settings.analysis.clone());

        Ok(Self::new(
            FileValidator::new(settings.max_file_size),
            Arc::new(extractor),
            Arc::new(orchestrator),
            cache,
            settings.storage_dir.clone(),
            settings.max_concurrent_analyses,
        )
        .with_timeout(settings.analysis_timeout))
    }

    /// Bound the whole in-gate flow.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn validator(&self) -> &FileValidator {
        &self.validator
    }

    pub fn extractor(&self) -> &Arc<TextExtractor> {
        &self.extractor
    }

    pub fn cache(&self) -> &Arc<AnalysisCache> {
        &self.cache
    }

    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Analyses currently holding a slot.
    pub fn active(&self) -> usize {
        self.max_concurrent - self.gate.available_permits()
    }

    /// Free slots.
    pub fn available(&self) -> usize {
        self.gate.available_permits()
    }

    /// Run the full flow over an uploaded byte stream.
    ///
    /// Waits for a free slot first. Nothing is written to disk until the
    /// leading bytes pass validation.
    pub async fn analyze_upload<S, E>(
        &self,
        meta: UploadMeta,
        body: S,
    ) -> Result<AnalysisResponse, PipelineError>
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: Display,
    {
        let started = Instant::now();
        let permit = self
            .gate
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| PipelineError::Internal(e.to_string()))?;
        debug!(
            active = self.active(),
            "Admitted {}",
            meta.filename.as_deref().unwrap_or("<unnamed>")
        );

        let flow = self.run(&meta, body, started, permit);
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, flow)
                .await
                .map_err(|_| PipelineError::Timeout(limit))?,
            None => flow.await,
        }
    }

    /// Analyze a file on disk through the same flow as an upload.
    pub async fn analyze_path(
        &self,
        path: &Path,
        document_type: Option<String>,
    ) -> Result<AnalysisResponse, PipelineError> {
        let file = tokio::fs::File::open(path).await?;
        let meta = UploadMeta {
            filename: path
                .file_name()
                .and_then(|n| n.to_str())
                .map(str::to_string),
            content_type: Some(guess_content_type(path)),
            document_type,
        };
        self.analyze_upload(meta, ReaderStream::new(file)).await
    }

    async fn run<S, E>(
        &self,
        meta: &UploadMeta,
        body: S,
        started: Instant,
        permit: OwnedSemaphorePermit,
    ) -> Result<AnalysisResponse, PipelineError>
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: Display,
    {
        let mut body = std::pin::pin!(body);
        let filename = meta.filename.as_deref();

        let head = read_head(&mut body).await?;
        let validation = self
            .validator
            .check_header(filename, &head[..head.len().min(SNIFF_LEN)]);
        if !validation.is_valid {
            let reason = validation.error_message.unwrap_or_default();
            warn!("Rejected upload {:?}: {}", filename, reason);
            return Err(PipelineError::Validation(reason));
        }

        let file_id = Uuid::new_v4().to_string();
        let path = self
            .storage_dir
            .join(format!("{}.{}", file_id, validation.extension));
        let stored = StoredUpload { path, keep: false };
        let (file_size, file_hash) = self.store(&stored.path, head, &mut body).await?;
        info!(
            file_id = %file_id,
            file_size,
            "Stored upload {}",
            filename.unwrap_or_default()
        );

        let _lease = match self.cache.claim_hash(&file_hash).await {
            HashClaim::Cached(existing) => {
                info!(
                    file_id = %existing.file_id,
                    "Duplicate upload, returning cached analysis"
                );
                drop(stored);
                return Ok(AnalysisResponse::from_entry(
                    existing,
                    started.elapsed().as_secs_f64(),
                    true,
                ));
            }
            HashClaim::Claimed(lease) => lease,
        };

        let (extraction, _permit) = self.extract(&stored.path, &validation, permit).await?;
        info!(
            file_id = %file_id,
            pages = extraction.total_pages,
            words = extraction.word_count,
            "Extracted text in {:.2}s",
            extraction.processing_time
        );

        let original_filename = filename.unwrap_or("unknown_file").to_string();
        let analysis = self
            .orchestrator
            .analyze(
                &extraction.extracted_text,
                meta.document_type
                    .as_deref()
                    .filter(|t| !t.trim().is_empty())
                    .unwrap_or(validation.file_type.as_str()),
                &original_filename,
            )
            .await;

        let entry = CacheEntry {
            file_id: file_id.clone(),
            analysis,
            file_path: stored.keep(),
            original_filename,
            // Sniffed type first; clients often send application/octet-stream.
            content_type: validation
                .detected_mime
                .clone()
                .or_else(|| meta.content_type.clone())
                .unwrap_or_default(),
            created_at: Utc::now(),
            processing_time: started.elapsed().as_secs_f64(),
            file_size,
            file_hash,
            processing_notes: extraction.processing_notes,
            total_pages: extraction.total_pages,
            word_count: extraction.word_count,
        };
        info!(
            file_id = %file_id,
            confidence = entry.analysis.confidence,
            clauses = entry.analysis.key_clauses.len(),
            "Analysis completed in {:.2}s",
            entry.processing_time
        );
        self.cache.insert(entry.clone()).await;
        let processing_time = entry.processing_time;
        Ok(AnalysisResponse::from_entry(entry, processing_time, false))
    }

    /// Write `head` and the rest of `body` to `path`, hashing as we go.
    async fn store<S, E>(
        &self,
        path: &Path,
        head: Vec<u8>,
        body: &mut std::pin::Pin<&mut S>,
    ) -> Result<(u64, String), PipelineError>
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: Display,
    {
        let mut file = tokio::fs::File::create(path).await?;
        let mut hasher = Sha256::new();
        let mut size = head.len() as u64;
        self.enforce_max(size)?;
        hasher.update(&head);
        file.write_all(&head).await?;

        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| PipelineError::Upload(e.to_string()))?;
            size += chunk.len() as u64;
            self.enforce_max(size)?;
            hasher.update(&chunk);
            file.write_all(&chunk).await?;
        }
        file.flush().await?;

        if let Some(message) = self.validator.check_size(size) {
            return Err(PipelineError::Validation(message));
        }
        Ok((size, hex::encode(hasher.finalize())))
    }

    fn enforce_max(&self, size: u64) -> Result<(), PipelineError> {
        if size > self.validator.max_file_size() {
            if let Some(message) = self.validator.check_size(size) {
                return Err(PipelineError::Validation(message));
            }
        }
        Ok(())
    }

    /// Extract on a blocking thread that owns the upload's slot.
    ///
    /// If the caller is dropped (e.g. on timeout) the slot stays taken until
    /// the extraction itself finishes.
    async fn extract(
        &self,
        path: &Path,
        validation: &ValidationResult,
        permit: OwnedSemaphorePermit,
    ) -> Result<(crate::models::ExtractionResult, OwnedSemaphorePermit), PipelineError> {
        let extractor = self.extractor.clone();
        let path = path.to_path_buf();
        let file_type = validation.file_type;
        let (result, permit) = tokio::task::spawn_blocking(move || {
            (extractor.extract(&path, file_type), permit)
        })
        .await
        .map_err(|e| PipelineError::Internal(format!("extraction task failed: {}", e)))?;
        let result = result.map_err(|e| PipelineError::Extraction(e.to_string()))?;

        if !result.success {
            return Err(PipelineError::Extraction(
                result
                    .error_message
                    .unwrap_or_else(|| "text extraction failed".to_string()),
            ));
        }
        Ok((result, permit))
    }
}

/// Buffer chunks until at least [`SNIFF_LEN`] bytes or the end of the stream.
async fn read_head<S, E>(body: &mut std::pin::Pin<&mut S>) -> Result<Vec<u8>, PipelineError>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: Display,
{
    let mut head = Vec::with_capacity(SNIFF_LEN);
    while head.len() < SNIFF_LEN {
        match body.next().await {
            Some(chunk) => {
                let chunk = chunk.map_err(|e| PipelineError::Upload(e.to_string()))?;
                head.extend_from_slice(&chunk);
            }
            None => break,
        }
    }
    Ok(head)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::test_support::ScriptedProvider;
    use crate::llm::{AnalysisProvider, ProviderError};
    use crate::ocr::test_support::{write_png, FakeOcr, FakePdf};
    use crate::services::analysis::AnalysisSettings;
    use async_trait::async_trait;
    use std::io;
    use tempfile::TempDir;

    const GOOD: &str = r#"{"summary": "An NDA.", "key_clauses": [
        {"type": "Confidentiality", "content": "Keep it secret.", "importance": "high",
         "classification": "Confidentiality", "risk_score": 6, "page": 1}
    ], "document_type": "NDA", "confidence": 0.9}"#;

    struct Harness {
        _dir: TempDir,
        storage: PathBuf,
        pipeline: Arc<PipelineCoordinator>,
        ocr: Arc<FakeOcr>,
    }

    fn harness(provider: Arc<dyn AnalysisProvider>, max_concurrent: usize, max_size: u64) -> Harness {
        let dir = TempDir::new().unwrap();
        let storage = dir.path().join("uploads");
        std::fs::create_dir_all(&storage).unwrap();

        let ocr = Arc::new(FakeOcr::new(
            true,
            vec!["MUTUAL NON-DISCLOSURE AGREEMENT", "SECOND DOCUMENT TEXT"],
        ));
        let extractor = Arc::new(TextExtractor::new(
            Arc::new(FakePdf::new(vec![Some(&"Lorem ipsum ".repeat(20))])),
            ocr.clone(),
        ));
        let orchestrator = Arc::new(AnalysisOrchestrator::new(
            provider,
            AnalysisSettings {
                retry_delay_ms: 0,
                ..AnalysisSettings::default()
            },
        ));
        let pipeline = PipelineCoordinator::new(
            FileValidator::new(max_size),
            extractor,
            orchestrator,
            Arc::new(AnalysisCache::new()),
            storage.clone(),
            max_concurrent,
        );
        Harness {
            _dir: dir,
            storage,
            pipeline: Arc::new(pipeline),
            ocr,
        }
    }

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("img.png");
        write_png(&path, width, height);
        std::fs::read(path).unwrap()
    }

    fn chunks(data: Vec<u8>, size: usize) -> impl Stream<Item = Result<Bytes, io::Error>> {
        let parts: Vec<Result<Bytes, io::Error>> = data
            .chunks(size)
            .map(|c| Ok(Bytes::copy_from_slice(c)))
            .collect();
        futures::stream::iter(parts)
    }

    fn meta(name: &str) -> UploadMeta {
        UploadMeta {
            filename: Some(name.to_string()),
            content_type: Some("image/png".to_string()),
            document_type: None,
        }
    }

    fn stored_files(dir: &Path) -> usize {
        std::fs::read_dir(dir).unwrap().count()
    }

    #[tokio::test]
    async fn test_image_upload_is_analyzed_and_cached() {
        let provider = Arc::new(ScriptedProvider::always(Ok(GOOD.to_string())));
        let h = harness(provider.clone(), 5, 1024 * 1024);

        let response = h
            .pipeline
            .analyze_upload(meta("nda.png"), chunks(png_bytes(40, 30), 1000))
            .await
            .unwrap();

        assert!(!response.deduplicated);
        assert_eq!(response.analysis.document_type, "NDA");
        assert_eq!(response.total_pages, 1);
        assert_eq!(response.word_count, 3);
        assert_eq!(provider.call_count(), 1);

        let entry = h.pipeline.cache().get(&response.file_id).await.unwrap();
        assert_eq!(entry.original_filename, "nda.png");
        assert_eq!(entry.file_hash.len(), 64);
        assert!(entry.file_path.exists());
        assert_eq!(
            entry.file_path.file_name().unwrap().to_str().unwrap(),
            format!("{}.png", response.file_id)
        );
        assert_eq!(h.pipeline.active(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_upload_reuses_original_id() {
        let provider = Arc::new(ScriptedProvider::always(Ok(GOOD.to_string())));
        let h = harness(provider.clone(), 5, 1024 * 1024);
        let bytes = png_bytes(40, 30);

        let first = h
            .pipeline
            .analyze_upload(meta("a.png"), chunks(bytes.clone(), 700))
            .await
            .unwrap();
        let second = h
            .pipeline
            .analyze_upload(meta("copy.png"), chunks(bytes, 300))
            .await
            .unwrap();

        assert!(second.deduplicated);
        assert_eq!(second.file_id, first.file_id);
        assert_eq!(second.analysis, first.analysis);
        assert_eq!(provider.call_count(), 1);
        assert_eq!(h.ocr.calls(), 1);
        assert_eq!(stored_files(&h.storage), 1);
        assert_eq!(h.pipeline.cache().len().await, 1);
    }

    #[tokio::test]
    async fn test_signature_mismatch_writes_nothing() {
        let provider = Arc::new(ScriptedProvider::always(Ok(GOOD.to_string())));
        let h = harness(provider.clone(), 5, 1024 * 1024);

        let err = h
            .pipeline
            .analyze_upload(meta("x.pdf"), chunks(png_bytes(4, 4), 10))
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::Validation(ref m) if m.contains("does not match")));
        assert_eq!(stored_files(&h.storage), 0);
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn test_oversize_upload_is_removed() {
        let provider = Arc::new(ScriptedProvider::always(Ok(GOOD.to_string())));
        let bytes = png_bytes(200, 200);
        let max = (bytes.len() / 2) as u64;
        let h = harness(provider, 5, max);

        let err = h
            .pipeline
            .analyze_upload(meta("big.png"), chunks(bytes, 64))
            .await
            .unwrap_err();

        match err {
            PipelineError::Validation(message) => {
                assert!(message.contains(&format!("{} bytes", max)), "{}", message)
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(stored_files(&h.storage), 0);
    }

    #[tokio::test]
    async fn test_stream_error_cleans_up() {
        let provider = Arc::new(ScriptedProvider::always(Ok(GOOD.to_string())));
        let h = harness(provider, 5, 1024 * 1024);

        let mut parts: Vec<Result<Bytes, io::Error>> = vec![Ok(Bytes::from(png_bytes(40, 30)))];
        parts.push(Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset")));
        let err = h
            .pipeline
            .analyze_upload(meta("a.png"), futures::stream::iter(parts))
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::Upload(_)));
        assert_eq!(stored_files(&h.storage), 0);
    }

    #[tokio::test]
    async fn test_extraction_failure_cleans_up() {
        let provider = Arc::new(ScriptedProvider::always(Ok(GOOD.to_string())));
        let dir = TempDir::new().unwrap();
        let extractor = Arc::new(TextExtractor::new(
            Arc::new(FakePdf::new(vec![])),
            Arc::new(FakeOcr::new(false, vec![])),
        ));
        let pipeline = PipelineCoordinator::new(
            FileValidator::default(),
            extractor,
            Arc::new(AnalysisOrchestrator::new(provider, AnalysisSettings::default())),
            Arc::new(AnalysisCache::new()),
            dir.path().to_path_buf(),
            1,
        );

        let err = pipeline
            .analyze_upload(meta("scan.png"), chunks(png_bytes(10, 10), 100))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Extraction(ref m) if m.contains("OCR not available")));
        assert_eq!(stored_files(dir.path()), 0);
    }

    /// Blocks every call until released.
    struct GatedProvider {
        release: Semaphore,
        entered: std::sync::atomic::AtomicUsize,
    }

    #[async_trait]
    impl AnalysisProvider for GatedProvider {
        async fn generate(&self, _prompt: &str, _model: &str) -> Result<String, ProviderError> {
            self.entered
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            self.release.acquire().await.unwrap().forget();
            Ok(GOOD.to_string())
        }
    }

    #[tokio::test]
    async fn test_capacity_one_serializes_uploads() {
        use std::sync::atomic::Ordering;

        let provider = Arc::new(GatedProvider {
            release: Semaphore::new(0),
            entered: Default::default(),
        });
        let h = harness(provider.clone(), 1, 1024 * 1024);

        let first = tokio::spawn({
            let pipeline = h.pipeline.clone();
            async move {
                pipeline
                    .analyze_upload(meta("one.png"), chunks(png_bytes(40, 30), 512))
                    .await
            }
        });
        while provider.entered.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }
        assert_eq!(h.pipeline.active(), 1);
        assert_eq!(h.pipeline.available(), 0);

        let second = tokio::spawn({
            let pipeline = h.pipeline.clone();
            async move {
                pipeline
                    .analyze_upload(meta("two.png"), chunks(png_bytes(50, 30), 512))
                    .await
            }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!second.is_finished());
        assert_eq!(provider.entered.load(Ordering::SeqCst), 1);

        provider.release.add_permits(1);
        let first = first.await.unwrap().unwrap();
        assert!(!first.deduplicated);

        while provider.entered.load(Ordering::SeqCst) < 2 {
            tokio::task::yield_now().await;
        }
        provider.release.add_permits(1);
        let second = second.await.unwrap().unwrap();
        assert_ne!(first.file_id, second.file_id);
        assert_eq!(h.pipeline.active(), 0);
    }

    #[tokio::test]
    async fn test_timeout_removes_stored_file() {
        let provider = Arc::new(GatedProvider {
            release: Semaphore::new(0),
            entered: Default::default(),
        });
        let h = harness(provider, 1, 1024 * 1024);
        let pipeline = Arc::try_unwrap(h.pipeline)
            .ok()
            .unwrap()
            .with_timeout(Some(Duration::from_millis(100)));

        let err = pipeline
            .analyze_upload(meta("slow.png"), chunks(png_bytes(40, 30), 512))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Timeout(_)));
        assert_eq!(stored_files(&h.storage), 0);
        assert_eq!(pipeline.available(), 1);
    }

    #[tokio::test]
    async fn test_image_with_mismatched_extension_is_analyzed() {
        let provider = Arc::new(ScriptedProvider::always(Ok(GOOD.to_string())));
        let h = harness(provider, 5, 1024 * 1024);

        let response = h
            .pipeline
            .analyze_upload(meta("scan.bmp"), chunks(png_bytes(40, 30), 256))
            .await
            .unwrap();

        assert_eq!(response.analysis.document_type, "NDA");
        let entry = h.pipeline.cache().get(&response.file_id).await.unwrap();
        assert_eq!(
            entry.file_path.file_name().unwrap().to_str().unwrap(),
            format!("{}.bmp", response.file_id)
        );
        assert_eq!(h.ocr.calls(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_identical_uploads_analyze_once() {
        let provider = Arc::new(ScriptedProvider::always(Ok(GOOD.to_string())));
        let h = harness(provider.clone(), 5, 1024 * 1024);
        let bytes = png_bytes(40, 30);

        let (a, b) = tokio::join!(
            h.pipeline.analyze_upload(meta("a.png"), chunks(bytes.clone(), 128)),
            h.pipeline.analyze_upload(meta("b.png"), chunks(bytes, 128)),
        );
        let (a, b) = (a.unwrap(), b.unwrap());

        assert_eq!(a.file_id, b.file_id);
        assert!(a.deduplicated != b.deduplicated);
        assert_eq!(provider.call_count(), 1);
        assert_eq!(h.ocr.calls(), 1);
        assert_eq!(h.pipeline.cache().len().await, 1);
        assert_eq!(stored_files(&h.storage), 1);
        let entry = h.pipeline.cache().get(&a.file_id).await.unwrap();
        let indexed = h.pipeline.cache().find_by_hash(&entry.file_hash).await.unwrap();
        assert_eq!(indexed.file_id, a.file_id);
    }

    #[tokio::test]
    async fn test_file_type_is_default_document_type() {
        let provider = Arc::new(ScriptedProvider::always(Err(ProviderError::Authentication(
            "bad key".into(),
        ))));
        let h = harness(provider, 5, 1024 * 1024);

        let response = h
            .pipeline
            .analyze_upload(meta("scan.png"), chunks(png_bytes(40, 30), 512))
            .await
            .unwrap();
        assert_eq!(response.analysis.confidence, 0.0);
        assert_eq!(response.analysis.document_type, "image");

        let mut typed = meta("other.png");
        typed.document_type = Some("Lease".into());
        let response = h
            .pipeline
            .analyze_upload(typed, chunks(png_bytes(50, 30), 512))
            .await
            .unwrap();
        assert_eq!(response.analysis.document_type, "Lease");
    }

    /// OCR that blocks its thread for a fixed time.
    struct SlowOcr {
        delay: Duration,
        entered: std::sync::atomic::AtomicBool,
    }

    impl crate::ocr::OcrBackend for SlowOcr {
        fn name(&self) -> &'static str {
            "slow"
        }

        fn is_available(&self) -> bool {
            true
        }

        fn availability_hint(&self) -> String {
            String::new()
        }

        fn run_ocr(
            &self,
            _image_path: &Path,
            _mode: crate::ocr::SegmentationMode,
        ) -> Result<String, crate::ocr::OcrError> {
            self.entered
                .store(true, std::sync::atomic::Ordering::SeqCst);
            std::thread::sleep(self.delay);
            Ok("SLOW SCAN".to_string())
        }
    }

    #[tokio::test]
    async fn test_timed_out_extraction_keeps_its_slot() {
        let dir = TempDir::new().unwrap();
        let ocr = Arc::new(SlowOcr {
            delay: Duration::from_millis(800),
            entered: Default::default(),
        });
        let pipeline = PipelineCoordinator::new(
            FileValidator::default(),
            Arc::new(TextExtractor::new(Arc::new(FakePdf::new(vec![])), ocr.clone())),
            Arc::new(AnalysisOrchestrator::new(
                Arc::new(ScriptedProvider::always(Ok(GOOD.to_string()))),
                AnalysisSettings::default(),
            )),
            Arc::new(AnalysisCache::new()),
            dir.path().to_path_buf(),
            1,
        )
        .with_timeout(Some(Duration::from_millis(200)));

        let err = pipeline
            .analyze_upload(meta("slow.png"), chunks(png_bytes(40, 30), 512))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Timeout(_)));
        assert!(ocr.entered.load(std::sync::atomic::Ordering::SeqCst));
        assert_eq!(pipeline.available(), 0);

        let deadline = Instant::now() + Duration::from_secs(5);
        while pipeline.available() == 0 && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(pipeline.available(), 1);
    }
}
