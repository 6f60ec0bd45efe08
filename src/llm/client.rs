//! HTTP client for hosted and local LLMs.
//!
//! Speaks the Ollama `/api/generate` API and the OpenAI-compatible
//! `/v1/chat/completions` API (OpenRouter, OpenAI, Groq, ...).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::config::{LlmConfig, LlmProvider};
use super::provider::{AnalysisProvider, ProviderError};

/// LLM client used as the production [`AnalysisProvider`].
pub struct LlmClient {
    config: LlmConfig,
    client: Client,
}

/// Ollama API request format.
#[derive(Debug, Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
}

/// Ollama API response format.
#[derive(Debug, Deserialize)]
struct OllamaResponse {
    response: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl LlmClient {
    /// Create a new LLM client with the given configuration.
    pub fn new(config: LlmConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ProviderError::Unknown(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    /// Whether the client has what it needs to make a call.
    pub fn is_configured(&self) -> bool {
        match self.config.provider {
            LlmProvider::Ollama => true,
            LlmProvider::OpenAI => self.config.api_key.is_some(),
        }
    }

    fn base_url(&self) -> &str {
        self.config.endpoint.trim_end_matches('/')
    }

    async fn call_ollama(&self, prompt: &str, model: &str) -> Result<String, ProviderError> {
        let request = OllamaRequest {
            model,
            prompt,
            stream: false,
            options: OllamaOptions {
                temperature: self.config.temperature,
                num_predict: self.config.max_tokens,
            },
        };

        let url = format!("{}/api/generate", self.base_url());
        let resp = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(classify_transport)?;

        let resp = check_status(resp).await?;
        let body: OllamaResponse = resp
            .json()
            .await
            .map_err(|e| ProviderError::Unknown(format!("invalid Ollama response: {}", e)))?;
        Ok(body.response)
    }

    async fn call_chat(&self, prompt: &str, model: &str) -> Result<String, ProviderError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or_else(|| ProviderError::Authentication("no API key configured".to_string()))?;

        let request = ChatRequest {
            model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        let url = format!("{}/v1/chat/completions", self.base_url());
        let mut builder = self.client.post(&url).bearer_auth(api_key).json(&request);
        if let Some(ref referer) = self.config.referer {
            builder = builder.header("HTTP-Referer", referer);
        }
        if let Some(ref title) = self.config.app_title {
            builder = builder.header("X-Title", title);
        }

        let resp = builder.send().await.map_err(classify_transport)?;
        let resp = check_status(resp).await?;
        let body: ChatResponse = resp
            .json()
            .await
            .map_err(|e| ProviderError::Unknown(format!("invalid completion response: {}", e)))?;

        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ProviderError::Unknown("Empty response from provider".to_string()))
    }
}

#[async_trait]
impl AnalysisProvider for LlmClient {
    async fn generate(&self, prompt: &str, model: &str) -> Result<String, ProviderError> {
        debug!(
            "Calling {} model {} ({} prompt chars)",
            self.config.provider.as_str(),
            model,
            prompt.len()
        );
        let text = match self.config.provider {
            LlmProvider::Ollama => self.call_ollama(prompt, model).await?,
            LlmProvider::OpenAI => self.call_chat(prompt, model).await?,
        };
        Ok(text.trim().to_string())
    }
}

fn classify_transport(e: reqwest::Error) -> ProviderError {
    if e.is_timeout() || e.is_connect() || e.is_request() {
        ProviderError::Transient(e.to_string())
    } else {
        ProviderError::Unknown(e.to_string())
    }
}

pub(crate) fn classify_status(status: StatusCode, body: &str) -> ProviderError {
    let detail = format!("HTTP {}: {}", status, body.trim());
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ProviderError::Authentication(detail),
        StatusCode::TOO_MANY_REQUESTS | StatusCode::REQUEST_TIMEOUT => {
            ProviderError::Transient(detail)
        }
        s if s.is_server_error() => ProviderError::Transient(detail),
        _ => ProviderError::Unknown(detail),
    }
}

async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(classify_status(status, &body))
}
