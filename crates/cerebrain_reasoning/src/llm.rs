use crate::api_types::{Message, MessagesResponse, Tool};
use async_trait::async_trait;
use cerebrain_core::{LlmDefaults, ProviderError};

/// Parameters for one completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionParams {
    /// Maximum tokens to generate (will be clamped to provider limits)
    pub max_tokens: u32,
    /// Sampling temperature (0.0 - 2.0)
    pub temperature: f32,
}

impl Default for CompletionParams {
    fn default() -> Self {
        Self {
            max_tokens: 4096,
            temperature: 0.7,
        }
    }
}

impl From<&LlmDefaults> for CompletionParams {
    fn from(llm: &LlmDefaults) -> Self {
        Self {
            max_tokens: llm.max_tokens.max(1),
            temperature: llm.temperature.clamp(0.0, 2.0),
        }
    }
}

/// The LLM collaborator. Implementations must be safe to share between
/// independent sessions; none of them retry on their own.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(
        &self,
        system: &str,
        messages: Vec<Message>,
        tools: Vec<Tool>,
        params: CompletionParams,
    ) -> Result<MessagesResponse, ProviderError>;

    /// Total tokens accounted so far, when the provider reports usage.
    fn tokens_used(&self) -> u64 {
        0
    }
}
