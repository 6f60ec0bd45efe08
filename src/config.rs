//! Configuration management for Legalyzer using the prefer crate.
//!
//! Layers, lowest to highest priority: built-in defaults, a discovered or
//! explicit config file (`legalyzer.{toml,yaml,json}`), environment
//! variables, then CLI flags applied by the caller.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::llm::LlmConfig;
use crate::services::analysis::AnalysisSettings;
use crate::services::pipeline::DEFAULT_MAX_CONCURRENT_ANALYSES;
use crate::services::retention::{DEFAULT_CLEANUP_INTERVAL, DEFAULT_RETENTION};
use crate::services::validation::DEFAULT_MAX_FILE_SIZE;

const MB: u64 = 1024 * 1024;
const HOUR_SECS: u64 = 3600;

pub const DEFAULT_BIND: &str = "0.0.0.0:8000";

/// Resolved application settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Uploaded files awaiting retention cleanup.
    pub storage_dir: PathBuf,
    /// Rendered export artifacts.
    pub exports_dir: PathBuf,
    pub max_file_size: u64,
    pub max_concurrent_analyses: usize,
    pub cleanup_interval: Duration,
    pub cache_retention: Duration,
    /// Upper bound on one upload's in-gate processing. None = unbounded.
    pub analysis_timeout: Option<Duration>,
    /// Tesseract language code(s), e.g. "eng" or "eng+deu".
    pub ocr_language: String,
    pub min_chars_per_page: usize,
    pub bind: String,
    pub llm: LlmConfig,
    pub analysis: AnalysisSettings,
}

impl Default for Settings {
    fn default() -> Self {
        let llm = LlmConfig::default();
        let analysis = AnalysisSettings {
            model: llm.model.clone(),
            ..AnalysisSettings::default()
        };
        Self {
            storage_dir: PathBuf::from("temp_storage"),
            exports_dir: PathBuf::from("exports"),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            max_concurrent_analyses: DEFAULT_MAX_CONCURRENT_ANALYSES,
            cleanup_interval: DEFAULT_CLEANUP_INTERVAL,
            cache_retention: DEFAULT_RETENTION,
            analysis_timeout: None,
            ocr_language: "eng".to_string(),
            min_chars_per_page: crate::ocr::DEFAULT_MIN_CHARS_PER_PAGE,
            bind: DEFAULT_BIND.to_string(),
            llm,
            analysis,
        }
    }
}

impl Settings {
    /// Ensure storage and export directories exist.
    pub fn ensure_directories(&self) -> std::io::Result<()> {
        for (dir, label) in [
            (&self.storage_dir, "storage"),
            (&self.exports_dir, "exports"),
        ] {
            tracing::debug!("{} directory: {}", label, dir.display());
            fs::create_dir_all(dir).map_err(|e| {
                std::io::Error::new(
                    e.kind(),
                    format!(
                        "Failed to create {} directory '{}': {}",
                        label,
                        dir.display(),
                        e
                    ),
                )
            })?;
        }
        Ok(())
    }

    /// Apply environment variable overrides.
    ///
    /// Supported env vars: `TEMP_STORAGE_PATH`, `EXPORTS_PATH`,
    /// `MAX_FILE_SIZE_MB`, `MAX_CONCURRENT_ANALYSES`, `CLEANUP_INTERVAL_HOURS`,
    /// `CACHE_RETENTION_HOURS`, `ANALYSIS_TIMEOUT_SECS`, `OCR_LANGUAGE`,
    /// `BIND_ADDRESS`. Unparseable numbers are ignored.
    pub fn with_env_overrides(self) -> Self {
        self.apply_overrides(|key| std::env::var(key).ok().filter(|v| !v.is_empty()))
    }

    pub(crate) fn apply_overrides(mut self, var: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(path) = var("TEMP_STORAGE_PATH") {
            self.storage_dir = expand(&path);
        }
        if let Some(path) = var("EXPORTS_PATH") {
            self.exports_dir = expand(&path);
        }
        if let Some(mb) = parse_var::<u64>(&var, "MAX_FILE_SIZE_MB") {
            self.max_file_size = mb * MB;
        }
        if let Some(n) = parse_var::<usize>(&var, "MAX_CONCURRENT_ANALYSES") {
            self.max_concurrent_analyses = n.max(1);
        }
        if let Some(hours) = parse_var::<u64>(&var, "CLEANUP_INTERVAL_HOURS") {
            self.cleanup_interval = Duration::from_secs(hours.max(1) * HOUR_SECS);
        }
        if let Some(hours) = parse_var::<u64>(&var, "CACHE_RETENTION_HOURS") {
            self.cache_retention = Duration::from_secs(hours * HOUR_SECS);
        }
        if let Some(secs) = parse_var::<u64>(&var, "ANALYSIS_TIMEOUT_SECS") {
            self.analysis_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }
        if let Some(lang) = var("OCR_LANGUAGE") {
            self.ocr_language = lang;
        }
        if let Some(bind) = var("BIND_ADDRESS") {
            self.bind = bind;
        }
        self.llm = self.llm.apply_overrides(&var);
        self.analysis.model = self.llm.model.clone();
        self
    }
}

fn parse_var<T: std::str::FromStr>(var: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = var(key)?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!("Ignoring {}={:?}: not a number", key, raw);
            None
        }
    }
}

fn expand(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).as_ref())
}

/// Configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_dir: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exports_dir: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_file_size_mb: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_concurrent_analyses: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cleanup_interval_hours: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_retention_hours: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis_timeout_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ocr_language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_chars_per_page: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bind: Option<String>,
    /// LLM provider settings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm: Option<LlmConfig>,
    /// Retry ladder tuning.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<AnalysisSettings>,
    /// Path to the config file this was loaded from (not serialized).
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration using prefer for discovery.
    /// Automatically discovers legalyzer config files in standard locations.
    pub async fn load() -> Self {
        match prefer::load("legalyzer").await {
            Ok(pref_config) => match pref_config.source_path() {
                Some(path) => match Self::load_from_path(path).await {
                    Ok(config) => config,
                    Err(e) => {
                        tracing::warn!("{}; using defaults", e);
                        Self::default()
                    }
                },
                None => Self::default(),
            },
            Err(_) => Self::default(),
        }
    }

    /// Load configuration from a specific file path.
    /// Format follows the extension: TOML, YAML, otherwise JSON.
    pub async fn load_from_path(path: &Path) -> Result<Self, String> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| format!("Failed to read config file {}: {}", path.display(), e))?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");
        let mut config: Config = match ext {
            "toml" => toml::from_str(&contents)
                .map_err(|e| format!("Failed to parse TOML config: {}", e))?,
            "yaml" | "yml" => serde_yaml::from_str(&contents)
                .map_err(|e| format!("Failed to parse YAML config: {}", e))?,
            _ => serde_json::from_str(&contents)
                .map_err(|e| format!("Failed to parse JSON config: {}", e))?,
        };
        config.source_path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Directory relative paths in the file are resolved against.
    pub fn base_dir(&self) -> Option<PathBuf> {
        self.source_path
            .as_ref()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
    }

    /// Resolve a path that may be relative to the config file.
    /// - Absolute paths are returned as-is
    /// - Paths starting with ~ are expanded
    /// - Relative paths are joined to `base_dir`
    pub fn resolve_path(&self, path_str: &str, base_dir: &Path) -> PathBuf {
        let expanded = expand(path_str);
        if expanded.is_absolute() {
            expanded
        } else {
            base_dir.join(expanded)
        }
    }

    /// Apply file values on top of `settings`.
    pub fn apply_to_settings(&self, settings: &mut Settings, base_dir: &Path) {
        if let Some(ref dir) = self.storage_dir {
            settings.storage_dir = self.resolve_path(dir, base_dir);
        }
        if let Some(ref dir) = self.exports_dir {
            settings.exports_dir = self.resolve_path(dir, base_dir);
        }
        if let Some(mb) = self.max_file_size_mb {
            settings.max_file_size = mb * MB;
        }
        if let Some(n) = self.max_concurrent_analyses {
            settings.max_concurrent_analyses = n.max(1);
        }
        if let Some(hours) = self.cleanup_interval_hours {
            settings.cleanup_interval = Duration::from_secs(hours.max(1) * HOUR_SECS);
        }
        if let Some(hours) = self.cache_retention_hours {
            settings.cache_retention = Duration::from_secs(hours * HOUR_SECS);
        }
        if let Some(secs) = self.analysis_timeout_secs {
            settings.analysis_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }
        if let Some(ref lang) = self.ocr_language {
            settings.ocr_language = lang.clone();
        }
        if let Some(n) = self.min_chars_per_page {
            settings.min_chars_per_page = n;
        }
        if let Some(ref bind) = self.bind {
            settings.bind = bind.clone();
        }
        if let Some(ref llm) = self.llm {
            settings.llm = llm.clone();
        }
        if let Some(ref analysis) = self.analysis {
            settings.analysis = analysis.clone();
        }
        settings.analysis.model = settings.llm.model.clone();
    }
}

/// Options for loading settings.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Explicit config file path (overrides auto-discovery).
    pub config_path: Option<PathBuf>,
}

/// Load settings: defaults, then the config file, then the environment.
///
/// An explicit config path that cannot be read or parsed is an error;
/// a broken discovered file only produces a warning.
pub async fn load_settings(options: LoadOptions) -> Result<(Settings, Config), String> {
    let config = match options.config_path {
        Some(ref path) => Config::load_from_path(path).await?,
        None => Config::load().await,
    };

    let mut settings = Settings::default();
    let base_dir = config
        .base_dir()
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
    config.apply_to_settings(&mut settings, &base_dir);

    if let Some(ref path) = config.source_path {
        tracing::debug!("Loaded config from {}", path.display());
    }
    Ok((settings.with_env_overrides(), config))
}
