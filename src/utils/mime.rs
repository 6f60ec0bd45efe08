//! MIME detection and the extension tables uploads are checked against.

use std::path::Path;

/// Extensions accepted for upload, without the leading dot.
pub const ALLOWED_EXTENSIONS: &[&str] = &["pdf", "png", "jpg", "jpeg", "tiff", "bmp"];

/// MIME types accepted after content sniffing.
pub const ALLOWED_MIME_TYPES: &[&str] = &[
    "application/pdf",
    "image/png",
    "image/jpeg",
    "image/tiff",
    "image/bmp",
];

/// Reported when the leading bytes match no known signature.
pub const UNKNOWN_MIME: &str = "application/octet-stream";

/// Detect a MIME type from the leading bytes of a file.
pub fn sniff_mime(head: &[u8]) -> &'static str {
    infer::get(head)
        .map(|kind| kind.mime_type())
        .unwrap_or(UNKNOWN_MIME)
}

pub fn is_allowed_mime(mime: &str) -> bool {
    ALLOWED_MIME_TYPES.contains(&mime)
}

pub fn is_allowed_extension(ext: &str) -> bool {
    ALLOWED_EXTENSIONS.contains(&ext)
}

/// The MIME type an extension must sniff as, when it is cross-checked at all.
///
/// `tiff` and `bmp` return `None`: their content is accepted as long as it
/// sniffs as any allowed type.
pub fn expected_mime_for_extension(ext: &str) -> Option<&'static str> {
    match ext {
        "pdf" => Some("application/pdf"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        _ => None,
    }
}

/// Lowercase extension of a filename, without the dot. Empty when absent.
pub fn extension_of(filename: &str) -> String {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default()
}

/// Guess a Content-Type for serving a stored file back.
pub fn guess_content_type(path: &Path) -> String {
    mime_guess::from_path(path)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}
