//! Tesseract OCR backend implementation.
//!
//! Uses Tesseract OCR via command-line for text extraction.

use std::path::Path;
use std::process::Command;

use super::backend::{check_binary, run_tool, OcrBackend, OcrError, SegmentationMode};

/// Tesseract OCR backend.
pub struct TesseractBackend {
    /// Tesseract language code (e.g. "eng").
    language: String,
    /// Binary to invoke, normally just `tesseract`.
    command: String,
}

impl TesseractBackend {
    pub fn new(language: &str) -> Self {
        Self {
            language: language.to_string(),
            command: "tesseract".to_string(),
        }
    }

    /// Use a specific tesseract binary instead of the one on PATH.
    pub fn with_command(mut self, command: &str) -> Self {
        self.command = command.to_string();
        self
    }

    fn build_command(&self, image_path: &Path, mode: SegmentationMode) -> Command {
        let mut cmd = Command::new(&self.command);
        cmd.arg(image_path)
            .arg("stdout")
            .args(["-l", &self.language])
            .args(["--psm", &mode.psm().to_string()]);
        cmd
    }
}

impl Default for TesseractBackend {
    fn default() -> Self {
        Self::new("eng")
    }
}

impl OcrBackend for TesseractBackend {
    fn name(&self) -> &'static str {
        "tesseract"
    }

    fn is_available(&self) -> bool {
        check_binary(&self.command)
    }

    fn availability_hint(&self) -> String {
        if !check_binary(&self.command) {
            "Tesseract not installed. Install with: apt install tesseract-ocr".to_string()
        } else {
            "Tesseract is available".to_string()
        }
    }

    fn run_ocr(&self, image_path: &Path, mode: SegmentationMode) -> Result<String, OcrError> {
        tracing::debug!(
            "tesseract {} (psm {})",
            image_path.display(),
            mode.psm()
        );
        run_tool(&mut self.build_command(image_path, mode), "tesseract")
    }
}
