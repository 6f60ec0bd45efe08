//! One-shot document analysis.

use std::path::Path;
use std::sync::Arc;

use console::style;

use crate::config::Settings;
use crate::models::KeyClause;
use crate::services::{AnalysisCache, AnalysisResponse, PipelineCoordinator};
use crate::utils::truncate_chars;

/// Run the full pipeline over one file and print the result.
pub async fn cmd_analyze(
    settings: &Settings,
    file: &Path,
    json: bool,
    document_type: Option<String>,
) -> anyhow::Result<()> {
    settings.ensure_directories()?;
    let cache = Arc::new(AnalysisCache::new());
    let pipeline = PipelineCoordinator::from_settings(settings, cache.clone())?;

    if !json {
        println!("{} Analyzing {}", style("→").cyan(), file.display());
    }
    let outcome = pipeline.analyze_path(file, document_type).await;

    // The stored copy only exists for the server's download endpoint.
    cache.clear().await;
    let response = outcome?;

    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        print_report(&response);
    }
    Ok(())
}

fn print_report(response: &AnalysisResponse) {
    let analysis = &response.analysis;

    println!("\n{}", style(&analysis.document_type).bold());
    println!("{}", "-".repeat(60));
    println!(
        "  Confidence: {:.0}%  Pages: {}  Words: {}  Time: {:.1}s",
        analysis.confidence * 100.0,
        response.total_pages,
        response.word_count,
        response.processing_time
    );
    for note in &response.processing_notes {
        println!("  {} {}", style("note:").dim(), note);
    }

    println!("\n{}", style("Summary").cyan());
    println!("  {}", analysis.summary);

    println!(
        "\n{} ({})",
        style("Key clauses").cyan(),
        analysis.key_clauses.len()
    );
    for clause in &analysis.key_clauses {
        print_clause(clause);
    }
}

fn print_clause(clause: &KeyClause) {
    let risk = format!("risk {:.1}", clause.risk_score);
    let risk = if clause.risk_score >= 7.0 {
        style(risk).red()
    } else if clause.risk_score >= 4.0 {
        style(risk).yellow()
    } else {
        style(risk).green()
    };
    let page = clause
        .page
        .map(|p| format!(" p.{}", p))
        .unwrap_or_default();

    println!(
        "\n  {} [{} / {}] {}{}",
        style(&clause.clause_type).bold(),
        clause.importance.as_str(),
        clause.classification.as_str(),
        risk,
        page
    );
    let content = truncate_chars(&clause.content, 300);
    let ellipsis = if content.len() < clause.content.len() {
        "..."
    } else {
        ""
    };
    println!("    {}{}", content, ellipsis);
}
