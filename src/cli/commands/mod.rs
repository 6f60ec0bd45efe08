//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod analyze;
mod check;
mod formats;
mod serve;
mod validate;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::{load_settings, LoadOptions};

#[derive(Parser)]
#[command(name = "legalyzer")]
#[command(about = "Legal document analysis: validation, text extraction and clause analysis")]
#[command(version)]
pub struct Cli {
    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true, env = "LEGALYZER_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server
    Serve {
        /// Address to bind: "host:port", a bare port, or a bare host
        #[arg(short, long)]
        bind: Option<String>,
    },

    /// Analyze a single document in-process and print the result
    Analyze {
        /// PDF or image file to analyze
        file: PathBuf,
        /// Print the raw JSON response instead of a summary
        #[arg(long)]
        json: bool,
        /// Document type to report when the model does not name one
        #[arg(short = 't', long)]
        document_type: Option<String>,
    },

    /// Check a file against the upload rules without analyzing it
    Validate {
        /// File to validate
        file: PathBuf,
    },

    /// Report OCR/PDF tool availability and provider configuration
    Check,

    /// List accepted upload formats
    Formats,
}

/// Run the CLI.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let options = LoadOptions {
        config_path: cli.config,
    };
    let (mut settings, config) = load_settings(options).await.map_err(anyhow::Error::msg)?;

    match cli.command {
        Commands::Serve { bind } => {
            if let Some(bind) = bind {
                settings.bind = serve::normalize_bind(&bind);
            }
            serve::cmd_serve(&settings).await
        }
        Commands::Analyze {
            file,
            json,
            document_type,
        } => analyze::cmd_analyze(&settings, &file, json, document_type).await,
        Commands::Validate { file } => validate::cmd_validate(&settings, &file).await,
        Commands::Check => check::cmd_check(&settings, &config).await,
        Commands::Formats => formats::cmd_formats(&settings),
    }
}
