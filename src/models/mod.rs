//! Data models for Legalyzer.

mod analysis;
mod document;
mod entry;

pub use analysis::{
    clamp_unit, AnalysisResult, Classification, Importance, KeyClause, MAX_CONFIDENCE,
    MAX_RISK_SCORE, PARTIAL_PREFIX,
};
pub use document::{ExtractionResult, FileType, ValidationResult};
pub use entry::{CacheEntry, ExportFormat, ExportStatus, ExportTask};
