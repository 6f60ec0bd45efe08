//! Asynchronous export of cached analyses as JSON or PDF reports.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream, StringFormat};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info};
use uuid::Uuid;

use super::cache::AnalysisCache;
use crate::models::{AnalysisResult, CacheEntry, ExportFormat, ExportStatus, ExportTask};
use crate::utils::sanitize_filename;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Analysis not found or expired")]
    NotFound(String),

    #[error("PDF rendering failed: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("JSON rendering failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Report worker failed: {0}")]
    Worker(String),
}

/// Serialized form of a JSON export.
#[derive(Serialize)]
struct JsonReport<'a> {
    file_id: &'a str,
    original_filename: &'a str,
    content_type: &'a str,
    file_size: u64,
    file_hash: &'a str,
    analyzed_at: DateTime<Utc>,
    processing_time: f64,
    total_pages: u32,
    word_count: usize,
    processing_notes: &'a [String],
    #[serde(flatten)]
    analysis: &'a AnalysisResult,
    exported_at: DateTime<Utc>,
}

pub fn render_json(entry: &CacheEntry) -> Result<Vec<u8>, ReportError> {
    let report = JsonReport {
        file_id: &entry.file_id,
        original_filename: &entry.original_filename,
        content_type: &entry.content_type,
        file_size: entry.file_size,
        file_hash: &entry.file_hash,
        analyzed_at: entry.created_at,
        processing_time: entry.processing_time,
        total_pages: entry.total_pages,
        word_count: entry.word_count,
        processing_notes: &entry.processing_notes,
        analysis: &entry.analysis,
        exported_at: Utc::now(),
    };
    Ok(serde_json::to_vec_pretty(&report)?)
}

// A4 in points.
const PAGE_WIDTH: i64 = 595;
const PAGE_HEIGHT: i64 = 842;
const MARGIN: i64 = 50;
const FONT_SIZE: i64 = 10;
const LEADING: i64 = 14;
const WRAP_COLUMNS: usize = 95;
const LINES_PER_PAGE: usize = ((PAGE_HEIGHT - 2 * MARGIN) / LEADING) as usize;

/// One line of the PDF report.
enum Line {
    Heading(String),
    Body(String),
    Blank,
}

fn report_lines(entry: &CacheEntry) -> Vec<Line> {
    let analysis = &entry.analysis;
    let mut lines = vec![
        Line::Heading("Legal Document Analysis Report".to_string()),
        Line::Blank,
        Line::Body(format!("Document: {}", entry.original_filename)),
        Line::Body(format!("Document type: {}", analysis.document_type)),
        Line::Body(format!("Confidence: {:.0}%", analysis.confidence * 100.0)),
        Line::Body(format!(
            "Pages: {}   Words: {}   Analyzed: {}",
            entry.total_pages,
            entry.word_count,
            entry.created_at.format("%Y-%m-%d %H:%M UTC")
        )),
        Line::Blank,
        Line::Heading("Summary".to_string()),
    ];
    push_wrapped(&mut lines, &analysis.summary);

    lines.push(Line::Blank);
    lines.push(Line::Heading(format!(
        "Key Clauses ({})",
        analysis.key_clauses.len()
    )));
    for (i, clause) in analysis.key_clauses.iter().enumerate() {
        lines.push(Line::Blank);
        let page = clause
            .page
            .map(|p| format!(", page {}", p))
            .unwrap_or_default();
        lines.push(Line::Body(format!(
            "{}. {} [{} / {}] risk {:.1}/10{}",
            i + 1,
            clause.clause_type,
            clause.importance.as_str(),
            clause.classification.as_str(),
            clause.risk_score,
            page
        )));
        push_wrapped(&mut lines, &clause.content);
    }

    if !entry.processing_notes.is_empty() {
        lines.push(Line::Blank);
        lines.push(Line::Heading("Processing Notes".to_string()));
        for note in &entry.processing_notes {
            push_wrapped(&mut lines, &format!("- {}", note));
        }
    }
    lines
}

fn push_wrapped(lines: &mut Vec<Line>, text: &str) {
    for paragraph in text.lines() {
        let mut current = String::new();
        for word in paragraph.split_whitespace() {
            if !current.is_empty() && current.chars().count() + 1 + word.chars().count() > WRAP_COLUMNS {
                lines.push(Line::Body(std::mem::take(&mut current)));
            }
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(word);
        }
        if !current.is_empty() {
            lines.push(Line::Body(current));
        }
    }
}

/// Encode text for a WinAnsi Type1 font. Characters outside Latin-1 become '?'.
fn latin1(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| if (c as u32) < 256 { c as u8 } else { b'?' })
        .collect()
}

fn page_operations(lines: &[Line]) -> Vec<Operation> {
    let mut ops = vec![
        Operation::new("BT", vec![]),
        Operation::new("TL", vec![LEADING.into()]),
        Operation::new("Td", vec![MARGIN.into(), (PAGE_HEIGHT - MARGIN).into()]),
    ];
    for line in lines {
        let (font, text) = match line {
            Line::Heading(t) => ("F2", t.as_str()),
            Line::Body(t) => ("F1", t.as_str()),
            Line::Blank => ("F1", ""),
        };
        ops.push(Operation::new("Tf", vec![font.into(), FONT_SIZE.into()]));
        ops.push(Operation::new(
            "Tj",
            vec![Object::String(latin1(text), StringFormat::Literal)],
        ));
        ops.push(Operation::new("T*", vec![]));
    }
    ops.push(Operation::new("ET", vec![]));
    ops
}

pub fn render_pdf(entry: &CacheEntry) -> Result<Vec<u8>, ReportError> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let regular = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let bold = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica-Bold",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => regular, "F2" => bold },
    });

    let lines = report_lines(entry);
    let mut kids = Vec::new();
    for chunk in lines.chunks(LINES_PER_PAGE) {
        let content = Content {
            operations: page_operations(chunk),
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(Object::from(page_id));
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), PAGE_WIDTH.into(), PAGE_HEIGHT.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.compress();

    let mut out = Vec::new();
    doc.save_to(&mut out)?;
    Ok(out)
}

/// `{stem}_analysis_{first 8 of task id}.{ext}`
pub fn artifact_name(original_filename: &str, task_id: Uuid, format: ExportFormat) -> String {
    let stem = Path::new(original_filename)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(original_filename);
    let short: String = task_id.simple().to_string().chars().take(8).collect();
    format!(
        "{}_analysis_{}.{}",
        sanitize_filename(stem),
        short,
        format.extension()
    )
}

/// Starts export workers and tracks their tasks in the cache.
#[derive(Clone)]
pub struct ExportService {
    cache: Arc<AnalysisCache>,
    exports_dir: PathBuf,
}

impl ExportService {
    pub fn new(cache: Arc<AnalysisCache>, exports_dir: PathBuf) -> Self {
        Self { cache, exports_dir }
    }

    pub fn exports_dir(&self) -> &Path {
        &self.exports_dir
    }

    /// Register an export task and spawn its worker.
    pub async fn enqueue(&self, file_id: &str, format: ExportFormat) -> Result<ExportTask, ReportError> {
        if self.cache.get(file_id).await.is_none() {
            return Err(ReportError::NotFound(file_id.to_string()));
        }
        let task = ExportTask::new(file_id.to_string(), format);
        self.cache.create_export(task.clone()).await;
        info!(task_id = %task.task_id, file_id, format = format.as_str(), "Export queued");

        let service = self.clone();
        let task_id = task.task_id;
        tokio::spawn(async move {
            service.process(task_id).await;
        });
        Ok(task)
    }

    /// Render and write one task's artifact, recording the outcome.
    pub async fn process(&self, task_id: Uuid) -> Option<ExportTask> {
        let task = self.cache.get_export(task_id).await?;
        let outcome = self.render_task(&task).await;
        self.cache
            .update_export(task_id, |t| match outcome {
                Ok(path) => {
                    info!(task_id = %task_id, "Export written to {}", path.display());
                    t.status = ExportStatus::Completed;
                    t.file_path = Some(path);
                }
                Err(e) => {
                    error!(task_id = %task_id, file_id = %t.file_id, "Export failed: {}", e);
                    t.status = ExportStatus::Failed;
                    t.error = Some(e.to_string());
                }
            })
            .await
    }

    async fn render_task(&self, task: &ExportTask) -> Result<PathBuf, ReportError> {
        let entry = self
            .cache
            .get(&task.file_id)
            .await
            .ok_or_else(|| ReportError::NotFound(task.file_id.clone()))?;
        let path = self
            .exports_dir
            .join(artifact_name(&entry.original_filename, task.task_id, task.format));

        let format = task.format;
        let bytes = tokio::task::spawn_blocking(move || match format {
            ExportFormat::Json => render_json(&entry),
            ExportFormat::Pdf => render_pdf(&entry),
        })
        .await
        .map_err(|e| ReportError::Worker(e.to_string()))??;

        tokio::fs::write(&path, bytes).await?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Classification, Importance, KeyClause};
    use crate::services::cache::test_support::entry;
    use tempfile::TempDir;

    fn sample_entry() -> CacheEntry {
        let mut e = entry("file-1", "hash", "/nonexistent/file-1.pdf".into(), Utc::now());
        e.original_filename = "Lease Agreement (final).pdf".into();
        e.analysis.key_clauses = (0..40)
            .map(|i| KeyClause {
                clause_type: format!("Clause {}", i),
                content: "The lessee shall maintain the premises in good repair. ".repeat(6),
                importance: Importance::Medium,
                classification: Classification::Contractual,
                risk_score: 3.0,
                page: Some(1),
                confidence: 0.9,
            })
            .collect();
        e.processing_notes = vec!["OCR applied to 1 pages".into()];
        e
    }

    #[test]
    fn test_artifact_name() {
        let id = Uuid::parse_str("0123abcd-0000-0000-0000-000000000000").unwrap();
        assert_eq!(
            artifact_name("My Contract.v2.pdf", id, ExportFormat::Pdf),
            "My_Contract.v2_analysis_0123abcd.pdf"
        );
        assert_eq!(
            artifact_name("scan.png", id, ExportFormat::Json),
            "scan_analysis_0123abcd.json"
        );
    }

    #[test]
    fn test_json_report_shape() {
        let bytes = render_json(&sample_entry()).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["file_id"], "file-1");
        assert_eq!(value["document_type"], "Contract");
        assert_eq!(value["key_clauses"].as_array().unwrap().len(), 40);
        assert!(value["exported_at"].is_string());
        assert!(value.get("file_path").is_none());
    }

    #[test]
    fn test_pdf_report_paginates() {
        let bytes = render_pdf(&sample_entry()).unwrap();
        assert!(bytes.starts_with(b"%PDF-1.5"));
        let doc = Document::load_mem(&bytes).unwrap();
        assert!(doc.get_pages().len() > 1);
    }

    #[test]
    fn test_latin1_replaces_wide_chars() {
        assert_eq!(latin1("café ☃"), vec![b'c', b'a', b'f', 0xE9, b' ', b'?']);
    }

    #[tokio::test]
    async fn test_export_worker_completes_task() {
        let dir = TempDir::new().unwrap();
        let cache = Arc::new(AnalysisCache::new());
        cache.insert(sample_entry()).await;
        let service = ExportService::new(cache.clone(), dir.path().to_path_buf());

        for format in [ExportFormat::Json, ExportFormat::Pdf] {
            let task = ExportTask::new("file-1".into(), format);
            let id = task.task_id;
            cache.create_export(task).await;

            let done = service.process(id).await.unwrap();
            assert_eq!(done.status, ExportStatus::Completed);
            let path = done.file_path.unwrap();
            assert!(path.exists());
            assert!(path
                .file_name()
                .unwrap()
                .to_str()
                .unwrap()
                .starts_with("Lease_Agreement__final_analysis_"));
        }
    }

    #[tokio::test]
    async fn test_export_of_evicted_entry_fails() {
        let dir = TempDir::new().unwrap();
        let cache = Arc::new(AnalysisCache::new());
        let service = ExportService::new(cache.clone(), dir.path().to_path_buf());

        assert!(matches!(
            service.enqueue("missing", ExportFormat::Json).await,
            Err(ReportError::NotFound(_))
        ));

        let task = ExportTask::new("missing".into(), ExportFormat::Pdf);
        let id = task.task_id;
        cache.create_export(task).await;
        let failed = service.process(id).await.unwrap();
        assert_eq!(failed.status, ExportStatus::Failed);
        assert!(failed.error.is_some());
    }
}
