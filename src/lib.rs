//! Legalyzer - legal document analysis service.
//!
//! Accepts PDF and image uploads, extracts their text (falling back to OCR),
//! asks a language model for a structured clause analysis, and caches the
//! result for retrieval and export.

pub mod cli;
pub mod config;
pub mod llm;
pub mod models;
pub mod ocr;
pub mod server;
pub mod services;
pub mod utils;
