//! Document models for uploads moving through validation and extraction.

use serde::{Deserialize, Serialize};

/// Broad category of an uploaded document, derived from its sniffed content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileType {
    Pdf,
    Image,
    Unknown,
}

impl FileType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Image => "image",
            Self::Unknown => "unknown",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pdf" => Some(Self::Pdf),
            "image" => Some(Self::Image),
            "unknown" => Some(Self::Unknown),
            _ => None,
        }
    }

    /// Classify a sniffed MIME type.
    pub fn from_mime(mime: &str) -> Self {
        if mime == "application/pdf" {
            Self::Pdf
        } else if mime.starts_with("image/") {
            Self::Image
        } else {
            Self::Unknown
        }
    }
}

impl std::fmt::Display for FileType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of validating an upload. Produced once per upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub file_type: FileType,
    /// Lowercase extension without the leading dot.
    pub extension: String,
    /// Size in bytes (0 when it was not known at validation time).
    pub size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// MIME type detected from the leading bytes, if sniffing ran.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detected_mime: Option<String>,
}

impl ValidationResult {
    pub fn valid(file_type: FileType, extension: String, size: u64, mime: String) -> Self {
        Self {
            is_valid: true,
            file_type,
            extension,
            size,
            error_message: None,
            detected_mime: Some(mime),
        }
    }

    pub fn invalid(extension: String, size: u64, message: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            file_type: FileType::Unknown,
            extension,
            size,
            error_message: Some(message.into()),
            detected_mime: None,
        }
    }

    pub(crate) fn with_detected(mut self, mime: &str) -> Self {
        self.detected_mime = Some(mime.to_string());
        self
    }
}

/// Text extracted from a document, plus bookkeeping about how it was obtained.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub success: bool,
    pub extracted_text: String,
    pub total_pages: u32,
    pub word_count: usize,
    pub processing_notes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Wall-clock seconds spent extracting.
    pub processing_time: f64,
}

impl ExtractionResult {
    pub fn failed(message: impl Into<String>, notes: Vec<String>, processing_time: f64) -> Self {
        Self {
            success: false,
            extracted_text: String::new(),
            total_pages: 0,
            word_count: 0,
            processing_notes: notes,
            error_message: Some(message.into()),
            processing_time,
        }
    }
}
