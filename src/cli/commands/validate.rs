//! Upload-rule check for a local file.

use std::path::Path;

use console::style;
use tokio::io::AsyncReadExt;

use crate::config::Settings;
use crate::services::validation::SNIFF_LEN;
use crate::services::FileValidator;

pub async fn cmd_validate(settings: &Settings, file: &Path) -> anyhow::Result<()> {
    let validator = FileValidator::new(settings.max_file_size);
    let size = tokio::fs::metadata(file).await?.len();

    let mut head = Vec::with_capacity(SNIFF_LEN);
    tokio::fs::File::open(file)
        .await?
        .take(SNIFF_LEN as u64)
        .read_to_end(&mut head)
        .await?;

    let filename = file.file_name().and_then(|n| n.to_str());
    let result = validator.validate(filename, &head, size);

    if result.is_valid {
        println!(
            "{} {} ({}, {} bytes, {})",
            style("✓").green(),
            file.display(),
            result.file_type,
            result.size,
            result.detected_mime.as_deref().unwrap_or("unknown")
        );
        Ok(())
    } else {
        let reason = result
            .error_message
            .unwrap_or_else(|| "validation failed".to_string());
        eprintln!("{} {}: {}", style("✗").red(), file.display(), reason);
        anyhow::bail!("{} was rejected", file.display())
    }
}
