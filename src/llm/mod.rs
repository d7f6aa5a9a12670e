pub mod providers;
pub mod scripted;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// LLM provider types
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum LLMProvider {
    Gemini,
}

/// LLM configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LLMConfig {
    pub provider: LLMProvider,
    /// Override for the REST base URL, mostly for tests and proxies
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout_seconds: u64,
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            provider: LLMProvider::Gemini,
            endpoint: None,
            api_key: None,
            model: "gemini-2.5-pro".to_string(),
            max_tokens: 8192,
            temperature: 0.4,
            // Video uploads are large; this is the deployment-level ceiling.
            timeout_seconds: 300,
        }
    }
}

/// Binary payload sent alongside the prompt
#[derive(Debug, Clone)]
pub struct MediaAttachment {
    pub mime_type: String,
    /// Base64-encoded bytes
    pub data: String,
}

/// LLM response
#[derive(Debug, Clone)]
pub struct LLMResponse {
    pub content: String,
    pub tokens_used: Option<u32>,
}

/// Provider failures, classified so callers can map them to user messages
#[derive(thiserror::Error, Debug)]
pub enum LLMError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("invalid API key: {0}")]
    InvalidCredential(String),

    #[error("empty response from model")]
    EmptyResponse,

    #[error("configuration error: {0}")]
    Configuration(String),
}

/// Trait for LLM providers
#[async_trait]
pub trait LLM: Send + Sync {
    /// Send one prompt, optionally with an inline media attachment
    async fn generate(
        &self,
        prompt: &str,
        attachment: Option<&MediaAttachment>,
    ) -> Result<LLMResponse, LLMError>;
    async fn is_available(&self) -> bool;
    fn provider_type(&self) -> LLMProvider;
}

/// Create LLM instance based on configuration
pub fn create_llm(config: &LLMConfig) -> Result<Box<dyn LLM>, LLMError> {
    match config.provider {
        LLMProvider::Gemini => Ok(Box::new(providers::GeminiProvider::new(config.clone())?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_llm_config() {
        let config = LLMConfig::default();
        assert_eq!(config.provider, LLMProvider::Gemini);
        assert_eq!(config.timeout_seconds, 300);
        assert!(config.api_key.is_none());
    }

    #[test]
    fn test_create_llm_requires_key() {
        let config = LLMConfig::default();
        assert!(matches!(create_llm(&config), Err(LLMError::Configuration(_))));

        let config = LLMConfig {
            api_key: Some("test-key".to_string()),
            ..LLMConfig::default()
        };
        let llm = create_llm(&config).unwrap();
        assert_eq!(llm.provider_type(), LLMProvider::Gemini);
    }
}
