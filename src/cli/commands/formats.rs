//! Accepted upload formats.

use console::style;

use crate::config::Settings;
use crate::services::FileValidator;

pub fn cmd_formats(settings: &Settings) -> anyhow::Result<()> {
    let formats = FileValidator::new(settings.max_file_size).supported_formats();

    println!("\n{}", style("Supported Formats").bold());
    println!("{}", "-".repeat(50));
    println!("  Extensions: {}", formats.extensions.join(", "));
    println!("  MIME types: {}", formats.mime_types.join(", "));
    println!("  Max size:   {}MB", formats.max_file_size_mb);
    Ok(())
}
