//! Cached analyses and export jobs.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::AnalysisResult;

/// A completed analysis held in the in-memory cache.
///
/// Entries are replaced wholesale, never mutated in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub file_id: String,
    pub analysis: AnalysisResult,
    /// Where the uploaded bytes live in temporary storage.
    pub file_path: PathBuf,
    pub original_filename: String,
    pub content_type: String,
    pub created_at: DateTime<Utc>,
    pub processing_time: f64,
    pub file_size: u64,
    /// SHA-256 of the uploaded bytes, hex encoded.
    pub file_hash: String,
    pub processing_notes: Vec<String>,
    pub total_pages: u32,
    pub word_count: usize,
}

/// Output format of an export job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Json,
    Pdf,
}

impl ExportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Pdf => "pdf",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "json" => Some(Self::Json),
            "pdf" => Some(Self::Pdf),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        self.as_str()
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Json => "application/json",
            Self::Pdf => "application/pdf",
        }
    }
}

/// Lifecycle of an export job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportStatus {
    Processing,
    Completed,
    Failed,
}

impl ExportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

/// An asynchronous export of a cached analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportTask {
    pub task_id: Uuid,
    pub file_id: String,
    pub format: ExportFormat,
    pub status: ExportStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ExportTask {
    pub fn new(file_id: String, format: ExportFormat) -> Self {
        Self {
            task_id: Uuid::new_v4(),
            file_id,
            format,
            status: ExportStatus::Processing,
            file_path: None,
            error: None,
            created_at: Utc::now(),
        }
    }
}
