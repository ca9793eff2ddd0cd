use async_trait::async_trait;

use crate::error::AiError;

// =============================================================================
// Prompt
// =============================================================================

/// One generation call: a system preamble and a user prompt.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationPrompt {
    pub system: String,
    pub user: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl GenerationPrompt {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
            max_tokens: 8192,
            temperature: 0.7,
        }
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

// =============================================================================
// TextGenerator Trait
// =============================================================================

/// Opaque text-in/text-out generation capability.
///
/// Implementations make exactly one upstream request per call and never
/// retry; callers own retry and timeout policy.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &GenerationPrompt) -> Result<String, AiError>;

    /// Short label used in logs.
    fn name(&self) -> &str {
        "generator"
    }
}
