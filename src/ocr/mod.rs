//! OCR and text extraction module.
//!
//! Extracts text from uploads using:
//! - pdftotext (Poppler) for a PDF's embedded text layer
//! - Tesseract OCR for sparse PDF pages and image files
//!
//! Images are cleaned up (`enhance`) before they reach the OCR engine.

mod backend;
mod enhance;
mod extractor;
mod pdf;
mod tesseract;

pub use backend::{check_binary, OcrBackend, OcrError, SegmentationMode};
pub use enhance::{enhance_for_ocr, MIN_OCR_DIMENSION};
pub use extractor::{ExtractionError, TextExtractor, DEFAULT_MIN_CHARS_PER_PAGE, OCR_MISSING_MESSAGE};
pub use pdf::{PdfReader, PopplerReader};
pub use tesseract::TesseractBackend;

#[cfg(test)]
pub(crate) use extractor::test_support;
