//! Shared utility functions.
//!
//! - `mime`: content sniffing and the upload allow-lists
//! - `text`: UTF-8 safe truncation, word counts and filename cleanup

pub mod mime;
mod text;

pub use text::{format_mb, sanitize_filename, truncate_chars, word_count};
