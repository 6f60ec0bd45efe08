//! Text extraction with per-page OCR fallback.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use image::GenericImageView;
use tempfile::TempDir;
use thiserror::Error;
use tracing::{debug, warn};

use super::backend::{OcrBackend, OcrError, SegmentationMode};
use super::enhance::enhance_for_ocr;
use super::pdf::{PdfReader, BASE_DPI};
use crate::models::{ExtractionResult, FileType};
use crate::utils::word_count;

/// Pages whose embedded text is shorter than this are sent to OCR.
pub const DEFAULT_MIN_CHARS_PER_PAGE: usize = 50;

/// Pages are rasterized at this multiple of their natural size for OCR.
const RENDER_SCALE: u32 = 2;

const PAGE_ERROR_PLACEHOLDER: &str = "[Error extracting text from this page]";
const NO_IMAGE_TEXT_PLACEHOLDER: &str =
    "[No text could be extracted from this image. Try improving image quality or contrast.]";
pub const OCR_MISSING_MESSAGE: &str =
    "OCR not available. Please install Tesseract to process images.";
const OCR_INSTALL_NOTE: &str = "Install Tesseract OCR: https://github.com/tesseract-ocr/tesseract";

/// Errors that can occur during text extraction.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),

    #[error("External tool not found: {0}")]
    ToolNotFound(String),

    #[error("Extraction failed: {0}")]
    ExtractionFailed(String),

    #[error("Image error: {0}")]
    Image(String),

    #[error(transparent)]
    Ocr(#[from] OcrError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<image::ImageError> for ExtractionError {
    fn from(e: image::ImageError) -> Self {
        ExtractionError::Image(e.to_string())
    }
}

/// Turns stored uploads into text.
///
/// Blocking: shells out to PDF and OCR tools. Async callers should run it
/// on a blocking thread.
pub struct TextExtractor {
    pdf: Arc<dyn PdfReader>,
    ocr: Arc<dyn OcrBackend>,
    min_chars_per_page: usize,
}

impl TextExtractor {
    pub fn new(pdf: Arc<dyn PdfReader>, ocr: Arc<dyn OcrBackend>) -> Self {
        Self {
            pdf,
            ocr,
            min_chars_per_page: DEFAULT_MIN_CHARS_PER_PAGE,
        }
    }

    /// Set minimum characters per page threshold.
    pub fn with_min_chars(mut self, min_chars: usize) -> Self {
        self.min_chars_per_page = min_chars;
        self
    }

    pub fn ocr_available(&self) -> bool {
        self.ocr.is_available()
    }

    pub fn ocr_backend(&self) -> &dyn OcrBackend {
        self.ocr.as_ref()
    }

    pub fn pdf_available(&self) -> bool {
        self.pdf.is_available()
    }

    /// Extract text from a stored file.
    pub fn extract(
        &self,
        file_path: &Path,
        file_type: FileType,
    ) -> Result<ExtractionResult, ExtractionError> {
        let start = Instant::now();
        let mut result = match file_type {
            FileType::Pdf => self.extract_pdf(file_path)?,
            FileType::Image => self.extract_image(file_path)?,
            FileType::Unknown => {
                return Err(ExtractionError::UnsupportedFileType(
                    file_path.display().to_string(),
                ))
            }
        };
        result.processing_time = start.elapsed().as_secs_f64();
        Ok(result)
    }

    fn extract_pdf(&self, file_path: &Path) -> Result<ExtractionResult, ExtractionError> {
        let page_count = self.pdf.page_count(file_path)?;
        let ocr_available = self.ocr.is_available();

        let mut aggregate = String::new();
        let mut words = 0;
        let mut ocr_pages = 0u32;

        for page in 1..=page_count {
            let text = match self.pdf.page_text(file_path, page) {
                Ok(text) => {
                    let text = text.trim_end_matches('\u{c}').to_string();
                    self.fill_sparse_page(file_path, page, text, ocr_available, &mut ocr_pages)
                }
                Err(e) => {
                    warn!("Failed to read page {} of {}: {}", page, file_path.display(), e);
                    PAGE_ERROR_PLACEHOLDER.to_string()
                }
            };
            words += word_count(&text);
            aggregate.push_str(&format!("\n--- Page {} ---\n{}\n", page, text));
        }

        let mut notes = Vec::new();
        if ocr_pages > 0 {
            notes.push(format!("OCR applied to {} pages", ocr_pages));
        }
        if !ocr_available && page_count > 0 {
            notes.push("OCR unavailable - some text may be missing".to_string());
        }

        Ok(ExtractionResult {
            success: true,
            extracted_text: aggregate.trim().to_string(),
            total_pages: page_count,
            word_count: words,
            processing_notes: notes,
            error_message: None,
            processing_time: 0.0,
        })
    }

    /// Decide the final text of one page, running OCR when the text layer is thin.
    fn fill_sparse_page(
        &self,
        file_path: &Path,
        page: u32,
        text: String,
        ocr_available: bool,
        ocr_pages: &mut u32,
    ) -> String {
        let embedded_len = text.trim().chars().count();
        if embedded_len >= self.min_chars_per_page {
            return text;
        }
        if !ocr_available {
            return format!("[Page {}: Text extraction failed - OCR not available]", page);
        }

        match self.ocr_pdf_page(file_path, page) {
            Ok(ocr_text) if ocr_text.trim().chars().count() > embedded_len => {
                *ocr_pages += 1;
                ocr_text
            }
            Ok(_) => text,
            Err(e) => {
                warn!("OCR failed for page {} of {}: {}", page, file_path.display(), e);
                text
            }
        }
    }

    fn ocr_pdf_page(&self, file_path: &Path, page: u32) -> Result<String, ExtractionError> {
        let temp_dir = TempDir::new()?;
        let raster = self
            .pdf
            .render_page(file_path, page, BASE_DPI * RENDER_SCALE, temp_dir.path())?;
        let enhanced_path = self.enhance_to_file(&raster, temp_dir.path())?;
        debug!("Running OCR on page {} of {}", page, file_path.display());
        Ok(self
            .ocr
            .run_ocr(&enhanced_path, SegmentationMode::UniformBlock)?)
    }

    fn enhance_to_file(
        &self,
        source: &Path,
        dir: &Path,
    ) -> Result<std::path::PathBuf, ExtractionError> {
        let img = open_image(source)?;
        let enhanced = enhance_for_ocr(&img);
        let path = dir.join("enhanced.png");
        enhanced.save(&path)?;
        Ok(path)
    }

    fn extract_image(&self, file_path: &Path) -> Result<ExtractionResult, ExtractionError> {
        if !self.ocr.is_available() {
            return Ok(ExtractionResult::failed(
                OCR_MISSING_MESSAGE,
                vec![OCR_INSTALL_NOTE.to_string()],
                0.0,
            ));
        }

        let img = open_image(file_path)?;
        let (width, height) = img.dimensions();

        let temp_dir = TempDir::new()?;
        let enhanced = enhance_for_ocr(&img);
        let enhanced_path = temp_dir.path().join("enhanced.png");
        enhanced.save(&enhanced_path)?;

        let mut text = self
            .ocr
            .run_ocr(&enhanced_path, SegmentationMode::UniformBlock)?;
        if text.trim().is_empty() {
            debug!("No text with uniform-block segmentation, retrying with auto layout");
            text = self.ocr.run_ocr(&enhanced_path, SegmentationMode::Auto)?;
        }
        let text = text.trim().to_string();

        let (text, notes) = if text.is_empty() {
            (
                NO_IMAGE_TEXT_PLACEHOLDER.to_string(),
                vec![
                    "No text detected in image".to_string(),
                    "Tips: Ensure text is clear, high contrast, and properly oriented".to_string(),
                ],
            )
        } else {
            (
                text,
                vec![format!("OCR processed image: {}x{}px", width, height)],
            )
        };

        Ok(ExtractionResult {
            success: true,
            word_count: word_count(&text),
            extracted_text: text,
            total_pages: 1,
            processing_notes: notes,
            error_message: None,
            processing_time: 0.0,
        })
    }
}

/// Decode an image by its leading bytes, falling back to the extension.
///
/// Stored uploads keep the client's extension, which may not match the
/// actual encoding.
fn open_image(path: &Path) -> Result<image::DynamicImage, ExtractionError> {
    Ok(image::ImageReader::open(path)?
        .with_guessed_format()?
        .decode()?)
}
