//! The text-generation capability the analysis orchestrator depends on.

use async_trait::async_trait;
use thiserror::Error;
use tracing::warn;

/// Typed failures of a single generation call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    /// Credentials were rejected or missing.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Network failure, timeout, rate limit or provider outage.
    #[error("provider unavailable: {0}")]
    Transient(String),

    #[error("provider error: {0}")]
    Unknown(String),
}

/// A remote text-generation endpoint.
///
/// One call, one answer: no retries and no parsing happen here.
#[async_trait]
pub trait AnalysisProvider: Send + Sync {
    async fn generate(&self, prompt: &str, model: &str) -> Result<String, ProviderError>;
}

/// Canned answer used when the upstream provider cannot be reached.
pub const DEGRADED_RESPONSE: &str = r#"{
  "summary": "The AI analysis service is currently unavailable, so only a placeholder analysis could be produced. Please retry later.",
  "key_clauses": [
    {
      "type": "Service Notice",
      "content": "Automated clause analysis was not performed for this document.",
      "importance": "low",
      "classification": "Miscellaneous",
      "risk_score": 0,
      "page": null
    }
  ],
  "document_type": "Unknown Document",
  "confidence": 0.1
}"#;

/// Wraps a provider so authentication and network failures produce
/// [`DEGRADED_RESPONSE`] instead of an error.
///
/// Results produced this way look like a successful low-confidence analysis
/// to the orchestrator. Only enable it when callers accept that.
pub struct DegradedResponseProvider<P> {
    inner: P,
}

impl<P: AnalysisProvider> DegradedResponseProvider<P> {
    pub fn new(inner: P) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<P: AnalysisProvider> AnalysisProvider for DegradedResponseProvider<P> {
    async fn generate(&self, prompt: &str, model: &str) -> Result<String, ProviderError> {
        match self.inner.generate(prompt, model).await {
            Err(e @ (ProviderError::Authentication(_) | ProviderError::Transient(_))) => {
                warn!("Provider outage, substituting degraded response: {}", e);
                Ok(DEGRADED_RESPONSE.to_string())
            }
            other => other,
        }
    }
}
