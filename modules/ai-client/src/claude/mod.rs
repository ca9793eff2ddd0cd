mod client;
pub(crate) mod types;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::AiError;
use crate::traits::{GenerationPrompt, TextGenerator};

use client::ClaudeClient;
use types::*;

/// Transport-level ceiling; callers usually enforce a tighter one.
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(120);

// =============================================================================
// Claude Generator
// =============================================================================

#[derive(Clone)]
pub struct Claude {
    api_key: String,
    pub(crate) model: String,
    base_url: Option<String>,
    http_timeout: Duration,
}

impl Claude {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: None,
            http_timeout: DEFAULT_HTTP_TIMEOUT,
        }
    }

    pub fn from_env(model: impl Into<String>) -> Result<Self, AiError> {
        let api_key = std::env::var("ANTHROPIC_API_KEY")
            .map_err(|_| AiError::Config("ANTHROPIC_API_KEY environment variable not set".into()))?;
        Ok(Self::new(api_key, model))
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn client(&self) -> Result<ClaudeClient, AiError> {
        let client = ClaudeClient::new(&self.api_key, self.http_timeout)?;
        Ok(match self.base_url {
            Some(ref url) => client.with_base_url(url),
            None => client,
        })
    }
}

#[async_trait]
impl TextGenerator for Claude {
    async fn generate(&self, prompt: &GenerationPrompt) -> Result<String, AiError> {
        let request = ChatRequest::new(&self.model)
            .system(prompt.system.as_str())
            .message(WireMessage::user(prompt.user.as_str()))
            .max_tokens(prompt.max_tokens)
            .temperature(prompt.temperature);

        let response = self.client()?.chat(&request).await?;

        response
            .text()
            .ok_or_else(|| AiError::EmptyResponse(self.model.clone()))
    }

    fn name(&self) -> &str {
        "claude"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::assert_err;

    #[test]
    fn test_claude_new() {
        let ai = Claude::new("sk-ant-test", "claude-sonnet-4-20250514");
        assert_eq!(ai.model(), "claude-sonnet-4-20250514");
        assert_eq!(ai.api_key, "sk-ant-test");
        assert_eq!(ai.http_timeout, DEFAULT_HTTP_TIMEOUT);
    }

    #[test]
    fn test_claude_with_base_url() {
        let ai = Claude::new("sk-ant-test", "claude-sonnet-4-20250514")
            .with_base_url("https://custom.api.com/");
        assert_eq!(ai.base_url, Some("https://custom.api.com/".to_string()));
        assert!(ai.client().is_ok());
    }

    #[tokio::test]
    async fn unreachable_endpoint_surfaces_network_error() {
        let ai = Claude::new("sk-ant-test", "model")
            .with_base_url("http://127.0.0.1:9")
            .with_http_timeout(Duration::from_millis(500));
        let err = assert_err!(ai.generate(&GenerationPrompt::new("sys", "hello")).await);
        assert!(matches!(err, AiError::Network(_) | AiError::Timeout));
    }
}
