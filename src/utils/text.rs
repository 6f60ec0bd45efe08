//! Small text helpers shared by extraction, analysis and export.

/// Return the first `max_chars` characters of `text` (UTF-8 safe).
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Number of whitespace-separated tokens.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Format a byte count as megabytes with one decimal.
pub fn format_mb(bytes: u64) -> String {
    format!("{:.1}MB", bytes as f64 / (1024.0 * 1024.0))
}

/// Reduce a user-supplied filename to something safe to embed in a path.
pub fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let trimmed = cleaned.trim_matches(|c| c == '.' || c == '_');
    if trimmed.is_empty() {
        "document".to_string()
    } else {
        truncate_chars(trimmed, 80).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_chars_is_char_based() {
        assert_eq!(truncate_chars("hello", 10), "hello");
        assert_eq!(truncate_chars("hello", 3), "hel");
        assert_eq!(truncate_chars("héllo wörld", 7), "héllo w");
        assert_eq!(truncate_chars("§§§", 0), "");
    }

    #[test]
    fn test_word_count() {
        assert_eq!(word_count("  the   quick\nbrown\tfox "), 4);
        assert_eq!(word_count(""), 0);
    }

    #[test]
    fn test_format_mb() {
        assert_eq!(format_mb(50 * 1024 * 1024), "50.0MB");
        assert_eq!(format_mb(1536 * 1024), "1.5MB");
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("lease agreement.pdf"), "lease_agreement.pdf");
        assert_eq!(sanitize_filename("../../etc/passwd"), "etc_passwd");
        assert_eq!(sanitize_filename("..."), "document");
    }
}
