//! LLM access: the provider capability, its HTTP client and configuration.

mod client;
mod config;
mod prompts;
mod provider;

pub use client::LlmClient;
pub use config::{LlmConfig, LlmProvider};
pub use prompts::{analysis_prompt, PARTIAL_ANALYSIS_NOTE};
pub use provider::{AnalysisProvider, DegradedResponseProvider, ProviderError, DEGRADED_RESPONSE};

#[cfg(test)]
pub(crate) use provider::test_support;

use std::sync::Arc;

/// Build the configured provider, wrapping it for outage degradation if enabled.
pub fn build_provider(config: &LlmConfig) -> Result<Arc<dyn AnalysisProvider>, ProviderError> {
    let client = LlmClient::new(config.clone())?;
    if config.degrade_on_outage {
        Ok(Arc::new(DegradedResponseProvider::new(client)))
    } else {
        Ok(Arc::new(client))
    }
}
