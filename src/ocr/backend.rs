//! OCR backend abstraction.
//!
//! The extractor only needs two things from an OCR engine: whether it can
//! run at all, and the text it reads from an image file. Keeping that as a
//! trait lets tests swap in a scripted backend.

use std::path::Path;
use std::process::Command;

use thiserror::Error;

/// Errors from OCR backends.
#[derive(Debug, Error)]
pub enum OcrError {
    #[error("Backend not available: {0}")]
    BackendNotAvailable(String),

    #[error("OCR failed: {0}")]
    OcrFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    ImageError(String),
}

impl From<image::ImageError> for OcrError {
    fn from(e: image::ImageError) -> Self {
        OcrError::ImageError(e.to_string())
    }
}

/// How the engine should segment the page into text blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentationMode {
    /// Treat the image as one uniform block of text (tesseract psm 6).
    UniformBlock,
    /// Let the engine detect layout itself (tesseract psm 3).
    Auto,
}

impl SegmentationMode {
    pub fn psm(&self) -> u8 {
        match self {
            Self::UniformBlock => 6,
            Self::Auto => 3,
        }
    }
}

/// Trait for OCR backends.
pub trait OcrBackend: Send + Sync {
    /// Short name used in logs and health output.
    fn name(&self) -> &'static str;

    /// Check if this backend is available (binary installed).
    fn is_available(&self) -> bool;

    /// Get a description of what's needed to make this backend available.
    fn availability_hint(&self) -> String;

    /// Run OCR on an image file and return the raw text.
    fn run_ocr(&self, image_path: &Path, mode: SegmentationMode) -> Result<String, OcrError>;
}

/// Check if a binary is on PATH.
pub fn check_binary(name: &str) -> bool {
    which::which(name).is_ok()
}

/// Map a finished subprocess to its stdout, or an error naming the tool.
pub(crate) fn command_stdout(
    result: std::io::Result<std::process::Output>,
    tool_name: &str,
) -> Result<String, OcrError> {
    match result {
        Ok(output) if output.status.success() => {
            Ok(String::from_utf8_lossy(&output.stdout).to_string())
        }
        Ok(output) => {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(OcrError::OcrFailed(format!(
                "{} failed: {}",
                tool_name,
                stderr.trim()
            )))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(OcrError::BackendNotAvailable(
            format!("{} not found", tool_name),
        )),
        Err(e) => Err(OcrError::Io(e)),
    }
}

/// Run a command and collect its stdout.
pub(crate) fn run_tool(command: &mut Command, tool_name: &str) -> Result<String, OcrError> {
    command_stdout(command.output(), tool_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_psm_values() {
        assert_eq!(SegmentationMode::UniformBlock.psm(), 6);
        assert_eq!(SegmentationMode::Auto.psm(), 3);
    }

    #[test]
    fn test_missing_tool_maps_to_unavailable() {
        let err = run_tool(
            &mut Command::new("legalyzer-definitely-not-a-real-binary"),
            "fake-tool",
        )
        .unwrap_err();
        assert!(matches!(err, OcrError::BackendNotAvailable(msg) if msg.contains("fake-tool")));
    }

    #[test]
    fn test_check_binary_missing() {
        assert!(!check_binary("legalyzer-definitely-not-a-real-binary"));
    }
}
