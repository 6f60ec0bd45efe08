//! Service layer for Legalyzer business logic.
//!
//! Everything here is independent of the HTTP and CLI surfaces, which
//! both drive the same [`PipelineCoordinator`].

pub mod analysis;
pub mod cache;
pub mod export;
pub mod pipeline;
pub mod retention;
pub mod validation;

pub use analysis::{AnalysisOrchestrator, AnalysisSettings};
pub use cache::{AnalysisCache, HashClaim, HashLease, SweepReport};
pub use export::{ExportService, ReportError};
pub use pipeline::{AnalysisResponse, PipelineCoordinator, PipelineError, UploadMeta};
pub use retention::{RetentionHandle, RetentionManager};
pub use validation::{FileValidator, SupportedFormats};
