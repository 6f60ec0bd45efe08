//! Environment check: extraction tools and provider configuration.

use console::style;

use crate::config::{Config, Settings};
use crate::llm::LlmClient;
use crate::ocr::{check_binary, OcrBackend, TesseractBackend};

fn status(ok: bool) -> console::StyledObject<&'static str> {
    if ok {
        style("✓ found").green()
    } else {
        style("✗ not found").red()
    }
}

/// Report what the pipeline will be able to do in this environment.
pub async fn cmd_check(settings: &Settings, config: &Config) -> anyhow::Result<()> {
    println!("\n{}", style("Configuration").bold());
    println!("{}", "-".repeat(50));
    match &config.source_path {
        Some(path) => println!("  Config file:   {}", path.display()),
        None => println!("  Config file:   {}", style("none (defaults + env)").dim()),
    }
    println!("  Storage:       {}", settings.storage_dir.display());
    println!("  Exports:       {}", settings.exports_dir.display());
    println!(
        "  Max file size: {}MB",
        settings.max_file_size / (1024 * 1024)
    );

    println!("\n{}", style("Extraction Tools:").cyan());
    let mut all_found = true;
    for tool in ["pdftotext", "pdfinfo", "pdftoppm"] {
        let found = check_binary(tool);
        all_found &= found;
        println!("  {:<15} {}", tool, status(found));
    }

    let tesseract = TesseractBackend::new(&settings.ocr_language);
    let ocr_ok = tesseract.is_available();
    all_found &= ocr_ok;
    println!(
        "  {:<15} {} (language: {})",
        "tesseract",
        status(ocr_ok),
        settings.ocr_language
    );
    if !ocr_ok {
        println!("                  {}", style(tesseract.availability_hint()).dim());
    }

    println!("\n{}", style("Analysis Provider:").cyan());
    let llm = &settings.llm;
    println!("  Provider:      {}", llm.provider.as_str());
    println!("  Endpoint:      {}", llm.endpoint);
    println!("  Model:         {}", llm.model);
    let configured = LlmClient::new(llm.clone())
        .map(|client| client.is_configured())
        .unwrap_or(false);
    if configured {
        println!("  API key:       {}", style("✓ configured").green());
    } else {
        println!(
            "  API key:       {} (set LLM_API_KEY or OPENROUTER_API_KEY)",
            style("✗ missing").red()
        );
    }
    if llm.degrade_on_outage {
        println!(
            "  {}",
            style("Outages return a canned low-confidence analysis").yellow()
        );
    }

    println!();
    if all_found && configured {
        println!("{} Ready to analyze documents", style("✓").green());
    } else {
        println!(
            "{} Some capabilities are unavailable; affected uploads will fail or degrade",
            style("!").yellow()
        );
    }
    Ok(())
}
