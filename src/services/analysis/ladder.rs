//! The fallback ladder: ordered analysis strategies of decreasing quality.
//!
//! Each rung declares which earlier failure it is willing to follow. The
//! combinator walks the rungs in order and returns the first success; when
//! nothing succeeds it builds the terminal error result.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::parse::{check_required, normalize, parse_object, AttemptError, TrustProfile};
use super::AnalysisSettings;
use crate::llm::{analysis_prompt, AnalysisProvider};
use crate::models::{
    AnalysisResult, Classification, Importance, KeyClause, MAX_CONFIDENCE, PARTIAL_PREFIX,
};
use crate::utils::truncate_chars;

/// Document type reported when neither the model nor the caller supplied one.
pub const DEFAULT_DOCUMENT_TYPE: &str = "Legal Document";

const PRIMARY: TrustProfile = TrustProfile {
    content_limit: 500,
    clause_confidence: 0.9,
    default_confidence: 0.5,
    max_confidence: MAX_CONFIDENCE,
    summary_prefix: "",
};

const REDUCED: TrustProfile = TrustProfile {
    content_limit: 200,
    clause_confidence: 0.6,
    default_confidence: 0.6,
    max_confidence: 0.7,
    summary_prefix: PARTIAL_PREFIX,
};

const MINIMAL_CONFIDENCE: f64 = 0.5;
const MINIMAL_CONTENT_CHARS: usize = 200;

/// What a rung gets to work with.
#[derive(Debug, Clone, Copy)]
pub struct AnalysisInput<'a> {
    pub text: &'a str,
    pub document_type_hint: &'a str,
    pub filename: &'a str,
}

impl AnalysisInput<'_> {
    fn document_type_or(&self, default: &str) -> String {
        let hint = self.document_type_hint.trim();
        if hint.is_empty() {
            default.to_string()
        } else {
            hint.to_string()
        }
    }
}

/// One rung of the ladder.
#[async_trait]
pub trait Strategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether to run after the previous rungs failed with `prior`
    /// (`None` when nothing has run yet).
    fn accepts(&self, prior: Option<&AttemptError>) -> bool;

    async fn attempt(&self, input: &AnalysisInput<'_>) -> Result<AnalysisResult, AttemptError>;
}

/// Walk the rungs in order, returning the first success.
pub async fn run_ladder(rungs: &[Box<dyn Strategy>], input: &AnalysisInput<'_>) -> AnalysisResult {
    let mut last_error: Option<AttemptError> = None;
    for rung in rungs {
        if !rung.accepts(last_error.as_ref()) {
            debug!("Skipping {} rung", rung.name());
            continue;
        }
        match rung.attempt(input).await {
            Ok(result) => {
                info!(
                    "Analysis of {} produced by {} rung (confidence {:.2})",
                    input.filename,
                    rung.name(),
                    result.confidence
                );
                return result;
            }
            Err(e) => {
                warn!("{} rung failed for {}: {}", rung.name(), input.filename, e);
                last_error = Some(e);
            }
        }
    }
    terminal_result(input, last_error.as_ref())
}

/// The last resort: a single high-risk "Error" clause with zero confidence.
pub fn terminal_result(input: &AnalysisInput<'_>, error: Option<&AttemptError>) -> AnalysisResult {
    let reason = error
        .map(|e| e.to_string())
        .unwrap_or_else(|| "no analysis strategy was applicable".to_string());
    AnalysisResult {
        summary: format!(
            "Analysis failed: {}. Please try uploading a smaller document or contact support.",
            reason
        ),
        key_clauses: vec![KeyClause {
            clause_type: "Error".to_string(),
            content: "Could not analyze document due to processing error.".to_string(),
            importance: Importance::High,
            classification: Classification::Miscellaneous,
            risk_score: 10.0,
            page: None,
            confidence: 0.0,
        }],
        document_type: input.document_type_or("Unknown Document"),
        confidence: 0.0,
    }
}

/// Full-quality analysis of the leading part of the document, with retries.
pub struct PrimaryStrategy {
    provider: Arc<dyn AnalysisProvider>,
    settings: AnalysisSettings,
}

impl PrimaryStrategy {
    pub fn new(provider: Arc<dyn AnalysisProvider>, settings: AnalysisSettings) -> Self {
        Self { provider, settings }
    }

    async fn attempt_once(
        &self,
        prompt: &str,
        input: &AnalysisInput<'_>,
    ) -> Result<AnalysisResult, AttemptError> {
        let raw = self.provider.generate(prompt, &self.settings.model).await?;
        let map = parse_object(&raw)?;
        check_required(&map)?;
        Ok(normalize(
            &map,
            &PRIMARY,
            &input.document_type_or(DEFAULT_DOCUMENT_TYPE),
        ))
    }

    /// Delay before the attempt following `attempt`.
    fn backoff(&self, attempt: u32, error: &AttemptError) -> Duration {
        let base = Duration::from_millis(self.settings.retry_delay_ms);
        if error.is_parse() {
            base
        } else {
            base * attempt
        }
    }
}

#[async_trait]
impl Strategy for PrimaryStrategy {
    fn name(&self) -> &'static str {
        "primary"
    }

    fn accepts(&self, prior: Option<&AttemptError>) -> bool {
        prior.is_none()
    }

    async fn attempt(&self, input: &AnalysisInput<'_>) -> Result<AnalysisResult, AttemptError> {
        let text = truncate_chars(input.text, self.settings.primary_chars);
        let prompt = analysis_prompt(text, false);
        let attempts = self.settings.max_attempts.max(1);

        let mut last_error = None;
        for attempt in 1..=attempts {
            debug!("Analysis attempt {}/{} for {}", attempt, attempts, input.filename);
            match self.attempt_once(&prompt, input).await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    warn!("Attempt {}/{} failed: {}", attempt, attempts, e);
                    if attempt < attempts {
                        tokio::time::sleep(self.backoff(attempt, &e)).await;
                    }
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.unwrap_or(AttemptError::EmptyResponse))
    }
}

/// Single reprompt over a shorter prefix, used after unparseable answers.
pub struct ReducedScopeStrategy {
    provider: Arc<dyn AnalysisProvider>,
    settings: AnalysisSettings,
}

impl ReducedScopeStrategy {
    pub fn new(provider: Arc<dyn AnalysisProvider>, settings: AnalysisSettings) -> Self {
        Self { provider, settings }
    }
}

#[async_trait]
impl Strategy for ReducedScopeStrategy {
    fn name(&self) -> &'static str {
        "reduced-scope"
    }

    fn accepts(&self, prior: Option<&AttemptError>) -> bool {
        prior.is_some_and(AttemptError::is_parse)
    }

    async fn attempt(&self, input: &AnalysisInput<'_>) -> Result<AnalysisResult, AttemptError> {
        let text = truncate_chars(input.text, self.settings.fallback_chars);
        let prompt = analysis_prompt(text, true);
        let raw = self.provider.generate(&prompt, &self.settings.model).await?;
        // Any unusable answer here, blank included, drops to the minimal rung.
        let map = parse_object(&raw).map_err(|e| match e {
            AttemptError::EmptyResponse => AttemptError::Parse("Empty response from AI".to_string()),
            other => other,
        })?;
        Ok(normalize(
            &map,
            &REDUCED,
            &input.document_type_or(DEFAULT_DOCUMENT_TYPE),
        ))
    }
}

/// No model involved: one "General Content" clause quoting the document.
pub struct MinimalStrategy;

#[async_trait]
impl Strategy for MinimalStrategy {
    fn name(&self) -> &'static str {
        "minimal"
    }

    fn accepts(&self, prior: Option<&AttemptError>) -> bool {
        prior.is_some_and(AttemptError::is_parse)
    }

    async fn attempt(&self, input: &AnalysisInput<'_>) -> Result<AnalysisResult, AttemptError> {
        Ok(minimal_result(input))
    }
}

pub fn minimal_result(input: &AnalysisInput<'_>) -> AnalysisResult {
    let head = truncate_chars(input.text, MINIMAL_CONTENT_CHARS);
    let content = if head.len() < input.text.len() {
        format!("{}...", head)
    } else {
        head.to_string()
    };
    AnalysisResult {
        summary: "Document processed with limited analysis due to processing constraints."
            .to_string(),
        key_clauses: vec![KeyClause {
            clause_type: "General Content".to_string(),
            content,
            importance: Importance::Medium,
            classification: Classification::Miscellaneous,
            risk_score: 5.0,
            page: Some(1),
            confidence: MINIMAL_CONFIDENCE,
        }],
        document_type: input.document_type_or(DEFAULT_DOCUMENT_TYPE),
        confidence: MINIMAL_CONFIDENCE,
    }
}

/// The standard ladder: primary, reduced scope, minimal.
pub fn default_rungs(
    provider: Arc<dyn AnalysisProvider>,
    settings: &AnalysisSettings,
) -> Vec<Box<dyn Strategy>> {
    vec![
        Box::new(PrimaryStrategy::new(provider.clone(), settings.clone())),
        Box::new(ReducedScopeStrategy::new(provider, settings.clone())),
        Box::new(MinimalStrategy),
    ]
}
