//! LLM client configuration.

use serde::{Deserialize, Serialize};

/// LLM provider type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    /// Ollama API (local)
    Ollama,
    /// OpenAI-compatible chat completions (OpenRouter, OpenAI, Groq, etc.)
    #[default]
    OpenAI,
}

impl LlmProvider {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "ollama" => Some(Self::Ollama),
            "openai" | "openrouter" | "groq" | "together" => Some(Self::OpenAI),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ollama => "ollama",
            Self::OpenAI => "openai",
        }
    }
}

/// Configuration for the LLM client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmConfig {
    /// LLM provider (ollama or openai-compatible)
    #[serde(default)]
    pub provider: LlmProvider,
    /// API base URL, without the `/v1/...` or `/api/...` suffix
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// API key for OpenAI-compatible providers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Model identifier passed to the provider
    #[serde(default = "default_model")]
    pub model: String,
    /// Maximum tokens in response
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Temperature for generation (0.0 - 1.0)
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Per-request timeout; expiry is reported as a transient failure
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Replace auth/network failures with a canned low-confidence answer
    #[serde(default)]
    pub degrade_on_outage: bool,
    /// Sent as `HTTP-Referer` (OpenRouter attribution)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referer: Option<String>,
    /// Sent as `X-Title` (OpenRouter attribution)
    #[serde(default = "default_app_title", skip_serializing_if = "Option::is_none")]
    pub app_title: Option<String>,
}

const OPENROUTER_ENDPOINT: &str = "https://openrouter.ai/api";
const OPENAI_ENDPOINT: &str = "https://api.openai.com";
const GROQ_ENDPOINT: &str = "https://api.groq.com/openai";
const OLLAMA_ENDPOINT: &str = "http://localhost:11434";

fn default_endpoint() -> String {
    OPENROUTER_ENDPOINT.to_string()
}

fn default_model() -> String {
    "google/gemini-flash-1.5".to_string()
}

fn default_max_tokens() -> u32 {
    8192
}

fn default_temperature() -> f32 {
    0.1
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_app_title() -> Option<String> {
    Some("Legalyzer".to_string())
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self::base_default().with_env_overrides()
    }
}

impl LlmConfig {
    /// Base default without env overrides.
    pub fn base_default() -> Self {
        Self {
            provider: LlmProvider::default(),
            endpoint: default_endpoint(),
            api_key: None,
            model: default_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            timeout_secs: default_timeout_secs(),
            degrade_on_outage: false,
            referer: None,
            app_title: default_app_title(),
        }
    }

    /// Apply environment variable overrides.
    ///
    /// Supported env vars:
    /// - `LLM_PROVIDER`: "openai" (default), "openrouter", "groq", or "ollama"
    /// - `LLM_ENDPOINT`: API base URL (defaults based on provider)
    /// - `LLM_API_KEY`: API key, wins over provider-specific keys
    /// - `LLM_MODEL`, `LLM_MAX_TOKENS`, `LLM_TEMPERATURE`, `LLM_TIMEOUT_SECS`
    /// - `LLM_DEGRADE_ON_OUTAGE`: "true" to answer outages with a canned result
    /// - `HTTP_REFERER`, `APP_TITLE`: OpenRouter attribution headers
    ///
    /// Without `LLM_PROVIDER`, the provider is picked from whichever of
    /// `OPENROUTER_API_KEY`, `GROQ_API_KEY` or `OPENAI_API_KEY` is set first.
    pub fn with_env_overrides(self) -> Self {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    pub(crate) fn apply_overrides(mut self, var: impl Fn(&str) -> Option<String>) -> Self {
        let explicit_provider = var("LLM_PROVIDER");
        let explicit_endpoint = var("LLM_ENDPOINT");

        if let Some(ref val) = explicit_provider {
            if let Some(provider) = LlmProvider::from_str(val) {
                self.provider = provider;
            }
        }
        if let Some(key) = var("LLM_API_KEY") {
            self.api_key = Some(key);
        }

        if let Some(ref provider_str) = explicit_provider {
            let (endpoint, key_var) = match provider_str.to_lowercase().as_str() {
                "ollama" => (OLLAMA_ENDPOINT, None),
                "groq" => (GROQ_ENDPOINT, Some("GROQ_API_KEY")),
                "openai" => (OPENAI_ENDPOINT, Some("OPENAI_API_KEY")),
                _ => (OPENROUTER_ENDPOINT, Some("OPENROUTER_API_KEY")),
            };
            if explicit_endpoint.is_none() {
                self.endpoint = endpoint.to_string();
            }
            if self.api_key.is_none() {
                self.api_key = key_var.and_then(&var);
            }
        } else if self.api_key.is_none() {
            let detected = [
                ("OPENROUTER_API_KEY", OPENROUTER_ENDPOINT),
                ("GROQ_API_KEY", GROQ_ENDPOINT),
                ("OPENAI_API_KEY", OPENAI_ENDPOINT),
            ]
            .into_iter()
            .find_map(|(key_var, endpoint)| var(key_var).map(|key| (key, endpoint)));

            if let Some((key, endpoint)) = detected {
                self.api_key = Some(key);
                self.provider = LlmProvider::OpenAI;
                if explicit_endpoint.is_none() {
                    self.endpoint = endpoint.to_string();
                }
            }
        }

        if let Some(endpoint) = explicit_endpoint {
            self.endpoint = endpoint;
        }
        if let Some(val) = var("LLM_MODEL") {
            self.model = val;
        }
        if let Some(n) = var("LLM_MAX_TOKENS").and_then(|v| v.parse().ok()) {
            self.max_tokens = n;
        }
        if let Some(t) = var("LLM_TEMPERATURE").and_then(|v| v.parse().ok()) {
            self.temperature = t;
        }
        if let Some(n) = var("LLM_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            self.timeout_secs = n;
        }
        if let Some(val) = var("LLM_DEGRADE_ON_OUTAGE") {
            self.degrade_on_outage = val.eq_ignore_ascii_case("true") || val == "1";
        }
        if let Some(val) = var("HTTP_REFERER") {
            self.referer = Some(val);
        }
        if let Some(val) = var("APP_TITLE") {
            self.app_title = Some(val);
        }
        self
    }

    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = endpoint.to_string();
        self
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    pub fn with_api_key(mut self, key: &str) -> Self {
        self.api_key = Some(key.to_string());
        self
    }

    pub fn with_provider(mut self, provider: LlmProvider) -> Self {
        self.provider = provider;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn overrides(pairs: &[(&str, &str)]) -> LlmConfig {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        LlmConfig::base_default().apply_overrides(|k| env.get(k).cloned())
    }

    #[test]
    fn test_base_default() {
        let config = LlmConfig::base_default();
        assert_eq!(config.provider, LlmProvider::OpenAI);
        assert_eq!(config.endpoint, OPENROUTER_ENDPOINT);
        assert_eq!(config.max_tokens, 8192);
        assert!((config.temperature - 0.1).abs() < f32::EPSILON);
        assert!(!config.degrade_on_outage);
        assert!(config.api_key.is_none());
    }

    #[test]
    fn test_openrouter_key_detected() {
        let config = overrides(&[("OPENROUTER_API_KEY", "or-key")]);
        assert_eq!(config.api_key.as_deref(), Some("or-key"));
        assert_eq!(config.endpoint, OPENROUTER_ENDPOINT);
    }

    #[test]
    fn test_explicit_provider_wins_over_detection() {
        let config = overrides(&[
            ("LLM_PROVIDER", "groq"),
            ("OPENROUTER_API_KEY", "or-key"),
            ("GROQ_API_KEY", "gsk-key"),
        ]);
        assert_eq!(config.api_key.as_deref(), Some("gsk-key"));
        assert_eq!(config.endpoint, GROQ_ENDPOINT);
    }

    #[test]
    fn test_ollama_provider() {
        let config = overrides(&[("LLM_PROVIDER", "ollama"), ("LLM_MODEL", "llama3:8b")]);
        assert_eq!(config.provider, LlmProvider::Ollama);
        assert_eq!(config.endpoint, OLLAMA_ENDPOINT);
        assert_eq!(config.model, "llama3:8b");
        assert!(config.api_key.is_none());
    }

    #[test]
    fn test_explicit_endpoint_and_numbers() {
        let config = overrides(&[
            ("OPENAI_API_KEY", "sk"),
            ("LLM_ENDPOINT", "http://proxy.local"),
            ("LLM_TIMEOUT_SECS", "30"),
            ("LLM_MAX_TOKENS", "not-a-number"),
            ("LLM_DEGRADE_ON_OUTAGE", "1"),
        ]);
        assert_eq!(config.endpoint, "http://proxy.local");
        assert_eq!(config.timeout_secs, 30);
        assert_eq!(config.max_tokens, 8192);
        assert!(config.degrade_on_outage);
    }
}
