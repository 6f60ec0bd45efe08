//! HTTP request handlers for the web server.

mod analysis;
mod analyze;
mod documents;
mod exports;
mod helpers;
mod status;

pub use analysis::{clear_analyses, get_analysis};
pub use analyze::analyze_document;
pub use documents::get_document;
pub use exports::{download_export, export_analysis, export_status};
pub use status::{health, root, stats, supported_formats};
