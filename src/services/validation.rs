//! Upload validation: extension allow-list, size limits and content sniffing.

use serde::Serialize;

use crate::models::{FileType, ValidationResult};
use crate::utils::mime::{
    expected_mime_for_extension, extension_of, is_allowed_extension, is_allowed_mime, sniff_mime,
    ALLOWED_EXTENSIONS, ALLOWED_MIME_TYPES,
};
use crate::utils::format_mb;

/// Bytes of an upload inspected for its content signature.
pub const SNIFF_LEN: usize = 8192;

/// Default upload ceiling (50MB).
pub const DEFAULT_MAX_FILE_SIZE: u64 = 50 * 1024 * 1024;

/// Formats accepted by the validator, as reported to clients.
#[derive(Debug, Clone, Serialize)]
pub struct SupportedFormats {
    pub extensions: Vec<String>,
    pub mime_types: Vec<String>,
    pub max_file_size_bytes: u64,
    pub max_file_size_mb: u64,
}

/// Checks uploads before anything is written to disk.
#[derive(Debug, Clone)]
pub struct FileValidator {
    max_file_size: u64,
}

impl Default for FileValidator {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FILE_SIZE)
    }
}

impl FileValidator {
    pub fn new(max_file_size: u64) -> Self {
        Self { max_file_size }
    }

    pub fn max_file_size(&self) -> u64 {
        self.max_file_size
    }

    /// Run every check in order against a file whose full size is known.
    pub fn validate(&self, filename: Option<&str>, head: &[u8], size: u64) -> ValidationResult {
        self.run_checks(filename, head, Some(size))
    }

    /// Run every check that can be decided from the leading bytes alone.
    ///
    /// Only emptiness is checked for size; the upper bound is enforced with
    /// [`check_size`](Self::check_size) while the rest of the stream arrives.
    pub fn check_header(&self, filename: Option<&str>, head: &[u8]) -> ValidationResult {
        self.run_checks(filename, head, None)
    }

    /// Error message if `size` is outside the accepted range.
    pub fn check_size(&self, size: u64) -> Option<String> {
        if size == 0 {
            return Some("File is empty".to_string());
        }
        if size > self.max_file_size {
            return Some(format!(
                "File size ({} bytes, {}) exceeds maximum allowed size ({} bytes, {}MB)",
                size,
                format_mb(size),
                self.max_file_size,
                self.max_file_size / (1024 * 1024)
            ));
        }
        None
    }

    fn run_checks(&self, filename: Option<&str>, head: &[u8], size: Option<u64>) -> ValidationResult {
        let reported_size = size.unwrap_or(head.len() as u64);

        let filename = match filename.map(str::trim).filter(|f| !f.is_empty()) {
            Some(f) => f,
            None => return ValidationResult::invalid(String::new(), reported_size, "No filename provided"),
        };

        let extension = extension_of(filename);
        if !is_allowed_extension(&extension) {
            return ValidationResult::invalid(
                extension.clone(),
                reported_size,
                format!(
                    "File extension '.{}' not allowed. Supported: {}",
                    extension,
                    dotted(ALLOWED_EXTENSIONS)
                ),
            );
        }

        let size_error = match size {
            Some(n) => self.check_size(n),
            None if head.is_empty() => Some("File is empty".to_string()),
            None => None,
        };
        if let Some(message) = size_error {
            return ValidationResult::invalid(extension, reported_size, message);
        }

        let mime = sniff_mime(head);
        if !is_allowed_mime(mime) {
            return ValidationResult::invalid(
                extension,
                reported_size,
                format!(
                    "Invalid file type: {}. Supported types are: {}",
                    mime,
                    ALLOWED_MIME_TYPES.join(", ")
                ),
            )
            .with_detected(mime);
        }

        if let Some(expected) = expected_mime_for_extension(&extension) {
            if expected != mime {
                return ValidationResult::invalid(
                    extension.clone(),
                    reported_size,
                    format!(
                        "File extension '.{}' does not match detected type '{}'",
                        extension, mime
                    ),
                )
                .with_detected(mime);
            }
        }

        ValidationResult::valid(
            FileType::from_mime(mime),
            extension,
            reported_size,
            mime.to_string(),
        )
    }

    pub fn supported_formats(&self) -> SupportedFormats {
        SupportedFormats {
            extensions: ALLOWED_EXTENSIONS.iter().map(|e| format!(".{}", e)).collect(),
            mime_types: ALLOWED_MIME_TYPES.iter().map(|m| m.to_string()).collect(),
            max_file_size_bytes: self.max_file_size,
            max_file_size_mb: self.max_file_size / (1024 * 1024),
        }
    }
}

fn dotted(exts: &[&str]) -> String {
    exts.iter()
        .map(|e| format!(".{}", e))
        .collect::<Vec<_>>()
        .join(", ")
}
