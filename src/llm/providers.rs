use super::{LLMConfig, LLMError, LLMProvider, LLMResponse, MediaAttachment, LLM};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Gemini provider implementation
pub struct GeminiProvider {
    config: LLMConfig,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(rename = "generationConfig")]
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct GeminiPart {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(rename = "inlineData", skip_serializing_if = "Option::is_none")]
    inline_data: Option<GeminiInlineData>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiInlineData {
    #[serde(rename = "mimeType")]
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
struct GeminiGenerationConfig {
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(rename = "usageMetadata")]
    usage_metadata: Option<GeminiUsage>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiUsage {
    #[serde(rename = "totalTokenCount")]
    total_token_count: Option<u32>,
}

impl GeminiProvider {
    pub fn new(config: LLMConfig) -> Result<Self, LLMError> {
        if config.api_key.as_deref().map_or(true, |k| k.trim().is_empty()) {
            return Err(LLMError::Configuration("Gemini API key required".to_string()));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self { config, client })
    }

    fn base_url(&self) -> &str {
        self.config
            .endpoint
            .as_deref()
            .unwrap_or(GEMINI_BASE_URL)
            .trim_end_matches('/')
    }

    fn api_key(&self) -> Result<&str, LLMError> {
        self.config
            .api_key
            .as_deref()
            .ok_or_else(|| LLMError::Configuration("Gemini API key not configured".to_string()))
    }

    fn build_request(&self, prompt: &str, attachment: Option<&MediaAttachment>) -> GeminiRequest {
        let mut parts = Vec::with_capacity(2);
        if let Some(media) = attachment {
            parts.push(GeminiPart {
                inline_data: Some(GeminiInlineData {
                    mime_type: media.mime_type.clone(),
                    data: media.data.clone(),
                }),
                ..GeminiPart::default()
            });
        }
        parts.push(GeminiPart {
            text: Some(prompt.to_string()),
            ..GeminiPart::default()
        });

        GeminiRequest {
            contents: vec![GeminiContent { parts }],
            generation_config: GeminiGenerationConfig {
                max_output_tokens: self.config.max_tokens,
                temperature: self.config.temperature,
            },
        }
    }
}

/// Map a non-success Gemini reply onto the classified error variants
fn classify_api_error(status: u16, body: &str) -> LLMError {
    let lower = body.to_lowercase();
    if status == 429 || lower.contains("quota") || body.contains("RESOURCE_EXHAUSTED") {
        LLMError::QuotaExceeded(body.to_string())
    } else if status == 401
        || status == 403
        || lower.contains("api key")
        || body.contains("API_KEY_INVALID")
    {
        LLMError::InvalidCredential(body.to_string())
    } else {
        LLMError::Api {
            status,
            message: body.to_string(),
        }
    }
}

#[async_trait]
impl LLM for GeminiProvider {
    async fn generate(
        &self,
        prompt: &str,
        attachment: Option<&MediaAttachment>,
    ) -> Result<LLMResponse, LLMError> {
        let api_key = self.api_key()?;
        let request = self.build_request(prompt, attachment);

        let url = format!("{}/models/{}:generateContent", self.base_url(), self.config.model);

        debug!(
            "Sending request to Gemini API (model: {}, attachment: {})",
            self.config.model,
            attachment.map_or(0, |a| a.data.len())
        );

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let text = response.text().await.unwrap_or_default();
            return Err(classify_api_error(status, &text));
        }

        let gemini_response: GeminiResponse = response.json().await?;

        let content = gemini_response
            .candidates
            .into_iter()
            .filter_map(|c| c.content)
            .flat_map(|c| c.parts)
            .filter_map(|p| p.text)
            .collect::<Vec<_>>()
            .join("");

        if content.trim().is_empty() {
            return Err(LLMError::EmptyResponse);
        }

        let tokens_used = gemini_response
            .usage_metadata
            .and_then(|u| u.total_token_count);

        Ok(LLMResponse {
            content,
            tokens_used,
        })
    }

    async fn is_available(&self) -> bool {
        let Ok(api_key) = self.api_key() else {
            return false;
        };
        let url = format!("{}/models", self.base_url());

        match self
            .client
            .get(&url)
            .header("x-goog-api-key", api_key)
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    fn provider_type(&self) -> LLMProvider {
        LLMProvider::Gemini
    }
}
