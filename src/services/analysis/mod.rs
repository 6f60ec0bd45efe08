//! Turns extracted document text into a structured legal analysis.
//!
//! The orchestrator never fails: it walks a ladder of strategies
//! (see [`ladder`]) and falls back to a terminal error-shaped result.

pub mod ladder;
pub mod parse;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::llm::AnalysisProvider;
use crate::models::AnalysisResult;

pub use ladder::{
    default_rungs, run_ladder, terminal_result, AnalysisInput, MinimalStrategy, PrimaryStrategy,
    ReducedScopeStrategy, Strategy, DEFAULT_DOCUMENT_TYPE,
};
pub use parse::{clean_json_response, AttemptError};

/// Tuning for the analysis ladder.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisSettings {
    /// Model identifier passed to the provider. Mirrors `llm.model`.
    #[serde(skip)]
    pub model: String,
    /// Primary attempts before falling down the ladder.
    pub max_attempts: u32,
    /// Base retry delay in milliseconds.
    pub retry_delay_ms: u64,
    /// Characters of document text sent on the primary path.
    pub primary_chars: usize,
    /// Characters sent on the reduced-scope path.
    pub fallback_chars: usize,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            model: "google/gemini-flash-1.5".to_string(),
            max_attempts: 3,
            retry_delay_ms: 2000,
            primary_chars: 12_000,
            fallback_chars: 8_000,
        }
    }
}

/// Runs the analysis ladder against a provider.
pub struct AnalysisOrchestrator {
    rungs: Vec<Box<dyn Strategy>>,
    settings: AnalysisSettings,
}

impl AnalysisOrchestrator {
    pub fn new(provider: Arc<dyn AnalysisProvider>, settings: AnalysisSettings) -> Self {
        Self {
            rungs: default_rungs(provider, &settings),
            settings,
        }
    }

    /// Use a custom ladder instead of the standard one.
    pub fn with_rungs(rungs: Vec<Box<dyn Strategy>>, settings: AnalysisSettings) -> Self {
        Self { rungs, settings }
    }

    pub fn settings(&self) -> &AnalysisSettings {
        &self.settings
    }

    /// Analyze `text`. Always returns a result; failures produce the
    /// terminal zero-confidence result.
    pub async fn analyze(
        &self,
        text: &str,
        document_type_hint: &str,
        filename: &str,
    ) -> AnalysisResult {
        info!(
            "Analyzing {} ({} chars, model {})",
            filename,
            text.chars().count(),
            self.settings.model
        );
        let input = AnalysisInput {
            text,
            document_type_hint,
            filename,
        };
        run_ladder(&self.rungs, &input).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::test_support::ScriptedProvider;
    use crate::llm::ProviderError;
    use crate::models::{MAX_CONFIDENCE, MAX_RISK_SCORE, PARTIAL_PREFIX};

    const GOOD: &str = r#"{"summary": "A lease.", "key_clauses": [
        {"type": "Rent", "content": "Rent is due monthly.", "importance": "high",
         "classification": "Financial", "risk_score": 4, "page": 1}
    ], "document_type": "Lease Agreement", "confidence": 0.99}"#;

    fn orchestrator(provider: Arc<ScriptedProvider>) -> AnalysisOrchestrator {
        AnalysisOrchestrator::new(
            provider,
            AnalysisSettings {
                retry_delay_ms: 0,
                ..AnalysisSettings::default()
            },
        )
    }

    fn assert_bounded(result: &AnalysisResult) {
        assert!((0.0..=MAX_CONFIDENCE).contains(&result.confidence));
        for clause in &result.key_clauses {
            assert!((0.0..=MAX_RISK_SCORE).contains(&clause.risk_score));
            assert!((0.0..=1.0).contains(&clause.confidence));
        }
    }

    #[tokio::test]
    async fn test_primary_success_is_clamped() {
        let provider = Arc::new(ScriptedProvider::always(Ok(GOOD.to_string())));
        let result = orchestrator(provider.clone())
            .analyze("The tenant shall pay rent.", "", "lease.pdf")
            .await;

        assert_eq!(provider.call_count(), 1);
        assert_eq!(result.summary, "A lease.");
        assert_eq!(result.document_type, "Lease Agreement");
        assert_eq!(result.confidence, MAX_CONFIDENCE);
        assert_eq!(result.key_clauses[0].confidence, 0.9);
        assert!(!result.is_partial());
        assert_bounded(&result);
    }

    #[tokio::test]
    async fn test_retry_then_success() {
        let provider = Arc::new(ScriptedProvider::new(
            vec![Err(ProviderError::Transient("503".into()))],
            Ok(GOOD.to_string()),
        ));
        let result = orchestrator(provider.clone()).analyze("text", "", "a.pdf").await;
        assert_eq!(provider.call_count(), 2);
        assert_eq!(result.document_type, "Lease Agreement");
    }

    #[tokio::test]
    async fn test_parse_failures_fall_to_reduced_scope() {
        let reduced = r#"```json
        {"summary": "Short.", "key_clauses": [{"content": "x", "risk_score": 2}], "confidence": 0.95}
        ```"#;
        let provider = Arc::new(ScriptedProvider::new(
            vec![
                Ok("not json".into()),
                Ok("still not json".into()),
                Ok("{broken".into()),
                Ok(reduced.into()),
            ],
            Err(ProviderError::Unknown("unexpected".into())),
        ));
        let text = "word ".repeat(5000);
        let result = orchestrator(provider.clone())
            .analyze(&text, "Contract", "c.pdf")
            .await;

        assert_eq!(provider.call_count(), 4);
        assert!(result.summary.starts_with(PARTIAL_PREFIX));
        assert!(result.is_partial());
        assert_eq!(result.confidence, 0.7);
        assert_eq!(result.document_type, "Contract");
        assert_eq!(result.key_clauses[0].confidence, 0.6);

        let prompts = provider.prompts.lock().unwrap();
        assert!(prompts[3].contains(crate::llm::PARTIAL_ANALYSIS_NOTE));
        assert!(prompts[3].len() < prompts[0].len());
        assert_bounded(&result);
    }

    #[tokio::test]
    async fn test_persistent_parse_failures_reach_minimal() {
        let provider = Arc::new(ScriptedProvider::always(Ok("I am not JSON".into())));
        let result = orchestrator(provider.clone())
            .analyze("Some contract text", "", "c.pdf")
            .await;

        assert_eq!(provider.call_count(), 4);
        assert_eq!(result.key_clauses.len(), 1);
        assert_eq!(result.key_clauses[0].clause_type, "General Content");
        assert_eq!(result.key_clauses[0].content, "Some contract text");
        assert_eq!(result.confidence, 0.5);
        assert_eq!(result.document_type, DEFAULT_DOCUMENT_TYPE);
    }

    #[tokio::test]
    async fn test_provider_outage_is_terminal() {
        let provider = Arc::new(ScriptedProvider::always(Err(ProviderError::Transient(
            "connection refused".into(),
        ))));
        let result = orchestrator(provider.clone())
            .analyze("text", "NDA", "nda.pdf")
            .await;

        assert_eq!(provider.call_count(), 3);
        assert_eq!(result.confidence, 0.0);
        assert_eq!(result.document_type, "NDA");
        assert!(result.summary.starts_with("Analysis failed: "));
        assert!(result.summary.contains("connection refused"));
        assert_eq!(result.key_clauses[0].clause_type, "Error");
        assert_bounded(&result);
    }

    #[tokio::test]
    async fn test_missing_fields_skip_reduced_scope() {
        let provider = Arc::new(ScriptedProvider::always(Ok(r#"{"summary": "s"}"#.into())));
        let result = orchestrator(provider.clone()).analyze("text", "", "a.pdf").await;
        assert_eq!(provider.call_count(), 3);
        assert!(result.summary.contains("Missing required fields"));
        assert_eq!(result.document_type, "Unknown Document");
    }

    #[tokio::test]
    async fn test_reduced_provider_error_is_terminal() {
        let provider = Arc::new(ScriptedProvider::new(
            vec![Ok("x".into()), Ok("x".into()), Ok("x".into())],
            Err(ProviderError::Authentication("revoked".into())),
        ));
        let result = orchestrator(provider.clone()).analyze("text", "", "a.pdf").await;
        assert_eq!(provider.call_count(), 4);
        assert_eq!(result.key_clauses[0].clause_type, "Error");
        assert!(result.summary.contains("revoked"));
    }

    #[tokio::test]
    async fn test_primary_prompt_is_truncated() {
        let provider = Arc::new(ScriptedProvider::always(Ok(GOOD.to_string())));
        let text = "é".repeat(20_000);
        orchestrator(provider.clone()).analyze(&text, "", "a.pdf").await;
        let prompts = provider.prompts.lock().unwrap();
        let sent = prompts[0].rsplit("Document text:\n").next().unwrap();
        assert_eq!(sent.chars().count(), 12_000);
    }
}
