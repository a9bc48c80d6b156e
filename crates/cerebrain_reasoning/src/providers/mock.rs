//! Mock LLM Provider: deterministic responses for running without API keys.

use crate::api_types::{ContentBlock, Message, MessagesResponse, Role, Tool};
use crate::llm::{CompletionParams, LlmClient};
use cerebrain_core::ProviderError;

#[derive(Debug, Clone)]
pub struct MockProvider {
    model: String,
}

impl MockProvider {
    pub fn new(model: &str) -> Self {
        Self {
            model: model.to_string(),
        }
    }
}

fn last_user_text(messages: &[Message]) -> Option<&str> {
    messages
        .iter()
        .rev()
        .filter(|m| m.role == Role::User)
        .flat_map(|m| m.content.iter())
        .find_map(|b| match b {
            ContentBlock::Text { text } => Some(text.as_str()),
            _ => None,
        })
}

#[async_trait::async_trait]
impl LlmClient for MockProvider {
    async fn complete(
        &self,
        _system: &str,
        messages: Vec<Message>,
        _tools: Vec<Tool>,
        _params: CompletionParams,
    ) -> Result<MessagesResponse, ProviderError> {
        let skill_results = messages
            .last()
            .map(|m| {
                m.content
                    .iter()
                    .filter(|b| matches!(b, ContentBlock::ToolResult { .. }))
                    .count()
            })
            .unwrap_or(0);
        let text = if skill_results > 0 {
            format!("(Mock {}) {} skill result(s) received.", self.model, skill_results)
        } else {
            match last_user_text(&messages) {
                Some(t) => format!("(Mock {}) Received: {}", self.model, t),
                None => format!("(Mock {}) Online.", self.model),
            }
        };
        Ok(MessagesResponse::text(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_complete() {
        let provider = MockProvider::new("test-model");
        let resp = provider
            .complete(
                "system",
                vec![Message::user_text("ping")],
                vec![],
                CompletionParams::default(),
            )
            .await
            .unwrap();
        assert_eq!(resp.content.len(), 1);
        if let ContentBlock::Text { text } = &resp.content[0] {
            assert!(text.contains("test-model"));
            assert!(text.ends_with("ping"));
        } else {
            panic!("Expected Text block");
        }
    }

    #[tokio::test]
    async fn test_mock_acknowledges_skill_results() {
        let provider = MockProvider::new("m");
        let resp = provider
            .complete(
                "system",
                vec![Message {
                    role: Role::User,
                    content: vec![ContentBlock::ToolResult {
                        tool_use_id: "t".into(),
                        content: "{}".into(),
                        is_error: None,
                    }],
                }],
                vec![],
                CompletionParams::default(),
            )
            .await
            .unwrap();
        assert!(resp.joined_text().contains("1 skill result"));
    }
}
