//! Offline model that replays canned replies

use async_trait::async_trait;
use std::sync::Mutex;

use super::{LLMError, LLMProvider, LLMResponse, MediaAttachment, LLM};

/// Replays replies in order and records every prompt it receives.
/// Once the replies run out, each call fails with `EmptyResponse`.
pub struct ScriptedLLM {
    replies: Mutex<Vec<Result<String, LLMError>>>,
    prompts: Mutex<Vec<(String, bool)>>,
}

impl ScriptedLLM {
    pub fn new(replies: Vec<Result<String, LLMError>>) -> Self {
        Self {
            replies: Mutex::new(replies),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn replying(text: &str) -> Self {
        Self::new(vec![Ok(text.to_string())])
    }

    /// Prompts received so far, each with whether media was attached
    pub fn prompts(&self) -> Vec<(String, bool)> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().map(|p| p.len()).unwrap_or_default()
    }
}

#[async_trait]
impl LLM for ScriptedLLM {
    async fn generate(
        &self,
        prompt: &str,
        attachment: Option<&MediaAttachment>,
    ) -> Result<LLMResponse, LLMError> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push((prompt.to_string(), attachment.is_some()));
        }

        let next = match self.replies.lock() {
            Ok(mut replies) if !replies.is_empty() => replies.remove(0),
            _ => return Err(LLMError::EmptyResponse),
        };
        next.map(|content| LLMResponse {
            content,
            tokens_used: None,
        })
    }

    async fn is_available(&self) -> bool {
        true
    }

    fn provider_type(&self) -> LLMProvider {
        LLMProvider::Gemini
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_replays_in_order_then_runs_dry() {
        let llm = ScriptedLLM::new(vec![
            Ok("first".to_string()),
            Err(LLMError::QuotaExceeded("429".to_string())),
        ]);

        assert_eq!(llm.generate("a", None).await.unwrap().content, "first");
        assert!(matches!(llm.generate("b", None).await, Err(LLMError::QuotaExceeded(_))));
        assert!(matches!(llm.generate("c", None).await, Err(LLMError::EmptyResponse)));
        assert_eq!(llm.calls(), 3);
        assert_eq!(llm.prompts()[1], ("b".to_string(), false));
    }
}
