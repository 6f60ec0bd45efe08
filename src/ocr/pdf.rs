//! PDF page access through Poppler's command-line tools.
//!
//! `pdfinfo` gives the page count, `pdftotext` reads one page's embedded text
//! layer and `pdftoppm` rasterizes a page for OCR.

use std::path::{Path, PathBuf};
use std::process::Command;

use super::backend::check_binary;
use super::extractor::ExtractionError;

/// Resolution at which a page is rendered at 1x scale.
pub const BASE_DPI: u32 = 72;

/// Page-level access to a PDF document.
pub trait PdfReader: Send + Sync {
    fn is_available(&self) -> bool;

    /// Number of pages in the document.
    fn page_count(&self, pdf_path: &Path) -> Result<u32, ExtractionError>;

    /// Embedded text of a 1-based page.
    fn page_text(&self, pdf_path: &Path, page: u32) -> Result<String, ExtractionError>;

    /// Rasterize a 1-based page to a PNG inside `output_dir`.
    fn render_page(
        &self,
        pdf_path: &Path,
        page: u32,
        dpi: u32,
        output_dir: &Path,
    ) -> Result<PathBuf, ExtractionError>;
}

/// [`PdfReader`] backed by poppler-utils.
#[derive(Debug, Default, Clone)]
pub struct PopplerReader;

impl PopplerReader {
    pub fn new() -> Self {
        Self
    }
}

/// Map command output to stdout text, turning a missing binary into `ToolNotFound`.
fn handle_cmd_output(
    result: std::io::Result<std::process::Output>,
    tool_name: &str,
    error_prefix: &str,
) -> Result<String, ExtractionError> {
    match result {
        Ok(output) => {
            if output.status.success() {
                Ok(String::from_utf8_lossy(&output.stdout).to_string())
            } else {
                let stderr = String::from_utf8_lossy(&output.stderr);
                Err(ExtractionError::ExtractionFailed(format!(
                    "{}: {}",
                    error_prefix,
                    stderr.trim()
                )))
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(ExtractionError::ToolNotFound(tool_name.to_string()))
        }
        Err(e) => Err(ExtractionError::Io(e)),
    }
}

/// Pull the page count out of `pdfinfo` output.
pub(crate) fn parse_page_count(info: &str) -> Option<u32> {
    info.lines()
        .find(|line| line.starts_with("Pages:"))
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|n| n.parse().ok())
}

/// Find the image `pdftoppm` wrote for a page.
///
/// pdftoppm zero-pads the page number to the width of the document's page
/// count, so `page-1.png`, `page-01.png` and `page-001.png` are all possible.
pub(crate) fn find_page_image(dir: &Path, page: u32) -> Option<PathBuf> {
    for digits in [1, 2, 3, 4] {
        let path = dir.join(format!("page-{:0width$}.png", page, width = digits));
        if path.exists() {
            return Some(path);
        }
    }
    None
}

impl PdfReader for PopplerReader {
    fn is_available(&self) -> bool {
        check_binary("pdftotext") && check_binary("pdfinfo")
    }

    fn page_count(&self, pdf_path: &Path) -> Result<u32, ExtractionError> {
        let output = Command::new("pdfinfo").arg(pdf_path).output();
        let info = handle_cmd_output(output, "pdfinfo", "pdfinfo failed")?;
        parse_page_count(&info).ok_or_else(|| {
            ExtractionError::ExtractionFailed("could not read PDF page count".to_string())
        })
    }

    fn page_text(&self, pdf_path: &Path, page: u32) -> Result<String, ExtractionError> {
        let page_str = page.to_string();
        let output = Command::new("pdftotext")
            .args(["-layout", "-enc", "UTF-8"])
            .args(["-f", &page_str, "-l", &page_str])
            .arg(pdf_path)
            .arg("-")
            .output();
        handle_cmd_output(output, "pdftotext", "pdftotext failed")
    }

    fn render_page(
        &self,
        pdf_path: &Path,
        page: u32,
        dpi: u32,
        output_dir: &Path,
    ) -> Result<PathBuf, ExtractionError> {
        let page_str = page.to_string();
        let output = Command::new("pdftoppm")
            .args(["-png", "-r", &dpi.to_string()])
            .args(["-f", &page_str, "-l", &page_str])
            .arg(pdf_path)
            .arg(output_dir.join("page"))
            .output();
        handle_cmd_output(output, "pdftoppm", "pdftoppm failed to convert PDF page")?;

        find_page_image(output_dir, page).ok_or_else(|| {
            ExtractionError::ExtractionFailed(format!("No image generated for page {}", page))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use tempfile::TempDir;

    #[test]
    fn test_parse_page_count() {
        let info = "Title:          Lease\nProducer:       LibreOffice\nPages:          12\nEncrypted:      no\n";
        assert_eq!(parse_page_count(info), Some(12));
        assert_eq!(parse_page_count("Title: x\n"), None);
        assert_eq!(parse_page_count("Pages: lots\n"), None);
    }

    #[test]
    fn test_find_page_image_padded_variants() {
        let dir = TempDir::new().unwrap();
        File::create(dir.path().join("page-03.png")).unwrap();
        File::create(dir.path().join("page-012.png")).unwrap();
        File::create(dir.path().join("page-7.png")).unwrap();

        assert_eq!(find_page_image(dir.path(), 3), Some(dir.path().join("page-03.png")));
        assert_eq!(find_page_image(dir.path(), 12), Some(dir.path().join("page-012.png")));
        assert_eq!(find_page_image(dir.path(), 7), Some(dir.path().join("page-7.png")));
        assert_eq!(find_page_image(dir.path(), 4), None);
    }

    #[test]
    fn test_missing_tool_is_reported() {
        let err = handle_cmd_output(
            Command::new("no-such-pdf-tool-binary").output(),
            "no-such-pdf-tool-binary",
            "failed",
        )
        .unwrap_err();
        assert!(matches!(err, ExtractionError::ToolNotFound(name) if name == "no-such-pdf-tool-binary"));
    }
}
