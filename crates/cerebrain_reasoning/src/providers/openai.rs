//! OpenAI-compatible `chat/completions` client. Covers OpenAI, OpenRouter,
//! Ollama and any local server that speaks the same API.

use crate::api_types::{ContentBlock, Message, MessagesResponse, Role, Tool, Usage};
use crate::llm::{CompletionParams, LlmClient};
use anyhow::{Context, Result};
use cerebrain_core::config::LlmConfig;
use cerebrain_core::ProviderError;
use reqwest::Client;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

const MAX_ERROR_BODY: usize = 512;

#[derive(Debug)]
pub struct OpenAiClient {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
    tokens_used: AtomicU64,
}

impl OpenAiClient {
    /// Fails when the provider needs a key and `llm.api_key_env` is unset.
    pub fn new(cfg: &LlmConfig) -> Result<Self> {
        let needs_key = !matches!(cfg.provider.to_lowercase().as_str(), "ollama" | "local");
        let api_key = std::env::var(&cfg.api_key_env).ok().filter(|k| !k.is_empty());
        if needs_key && api_key.is_none() {
            anyhow::bail!(
                "provider '{}' needs an API key in ${}",
                cfg.provider,
                cfg.api_key_env
            );
        }
        Ok(Self {
            client: Client::builder()
                .timeout(Duration::from_secs(60))
                .build()
                .context("Failed to build HTTP client")?,
            api_key,
            base_url: cfg.resolved_api_base(),
            model: cfg.model.clone(),
            tokens_used: AtomicU64::new(0),
        })
    }
}

/// Convert tool schemas to OpenAI `function` tools.
pub(crate) fn to_openai_tools(tools: &[Tool]) -> Vec<Value> {
    tools
        .iter()
        .map(|t| {
            json!({
                "type": "function",
                "function": {
                    "name": t.name,
                    "description": t.description,
                    "parameters": t.input_schema
                }
            })
        })
        .collect()
}

/// OpenAI puts the system prompt first with role "system" and tool results
/// in their own `tool` messages.
pub(crate) fn to_openai_messages(system: &str, messages: Vec<Message>) -> Vec<Value> {
    let mut out = vec![json!({ "role": "system", "content": system })];

    for msg in messages {
        match msg.role {
            Role::User => {
                let mut texts = Vec::new();
                for block in msg.content {
                    match block {
                        ContentBlock::Text { text } => texts.push(text),
                        ContentBlock::ToolResult {
                            tool_use_id,
                            content,
                            ..
                        } => out.push(json!({
                            "role": "tool",
                            "tool_call_id": tool_use_id,
                            "content": content
                        })),
                        ContentBlock::ToolUse { .. } => {}
                    }
                }
                if !texts.is_empty() {
                    out.push(json!({ "role": "user", "content": texts.join("\n") }));
                }
            }
            Role::Assistant => {
                let mut texts = Vec::new();
                let mut tool_calls = Vec::new();
                for block in msg.content {
                    match block {
                        ContentBlock::Text { text } => texts.push(text),
                        ContentBlock::ToolUse { id, name, input } => tool_calls.push(json!({
                            "id": id,
                            "type": "function",
                            "function": {
                                "name": name,
                                "arguments": input.to_string()
                            }
                        })),
                        ContentBlock::ToolResult { .. } => {}
                    }
                }
                let mut obj = json!({ "role": "assistant" });
                obj["content"] = if texts.is_empty() {
                    Value::Null
                } else {
                    json!(texts.join("\n"))
                };
                if !tool_calls.is_empty() {
                    obj["tool_calls"] = json!(tool_calls);
                }
                out.push(obj);
            }
        }
    }
    out
}

pub(crate) fn parse_response(body: &Value) -> Result<MessagesResponse, ProviderError> {
    let choice = body
        .get("choices")
        .and_then(|c| c.get(0))
        .ok_or_else(|| ProviderError::transport("malformed response: no choices"))?;
    let message = &choice["message"];
    let stop_reason = choice["finish_reason"].as_str().map(|s| s.to_string());

    let mut content = Vec::new();
    if let Some(text) = message["content"].as_str() {
        if !text.is_empty() {
            content.push(ContentBlock::Text {
                text: text.to_string(),
            });
        }
    }
    if let Some(calls) = message["tool_calls"].as_array() {
        for (i, call) in calls.iter().enumerate() {
            let func = &call["function"];
            let Some(name) = func["name"].as_str().filter(|n| !n.is_empty()) else {
                continue;
            };
            let id = call["id"]
                .as_str()
                .map(|s| s.to_string())
                .unwrap_or_else(|| format!("call_{}", i));
            let input = match &func["arguments"] {
                Value::String(s) => serde_json::from_str(s).unwrap_or_else(|_| json!({})),
                Value::Object(_) => func["arguments"].clone(),
                _ => json!({}),
            };
            content.push(ContentBlock::ToolUse {
                id,
                name: name.to_string(),
                input,
            });
        }
    }

    let usage = body.get("usage").map(|u| Usage {
        input_tokens: u["prompt_tokens"].as_u64().unwrap_or(0),
        output_tokens: u["completion_tokens"].as_u64().unwrap_or(0),
    });

    Ok(MessagesResponse {
        content,
        stop_reason,
        usage,
    })
}

fn truncate_body(body: &str) -> String {
    let mut end = body.len().min(MAX_ERROR_BODY);
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    body[..end].to_string()
}

#[async_trait::async_trait]
impl LlmClient for OpenAiClient {
    async fn complete(
        &self,
        system: &str,
        messages: Vec<Message>,
        tools: Vec<Tool>,
        params: CompletionParams,
    ) -> Result<MessagesResponse, ProviderError> {
        let mut payload = json!({
            "model": self.model,
            "messages": to_openai_messages(system, messages),
            "max_tokens": params.max_tokens,
            "temperature": params.temperature,
        });
        if !tools.is_empty() {
            payload["tools"] = json!(to_openai_tools(&tools));
        }

        let url = format!("{}/chat/completions", self.base_url);
        let mut request = self.client.post(&url).json(&payload);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ProviderError::transport(format!("request to {} failed: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::http(status.as_u16(), truncate_body(&body)));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| ProviderError::transport(format!("malformed response: {}", e)))?;
        let parsed = parse_response(&body)?;
        if let Some(usage) = parsed.usage {
            let total = usage.input_tokens + usage.output_tokens;
            let so_far = self.tokens_used.fetch_add(total, Ordering::Relaxed) + total;
            tracing::debug!("LLM usage: +{} tokens ({} total)", total, so_far);
        }
        Ok(parsed)
    }

    fn tokens_used(&self) -> u64 {
        self.tokens_used.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api_types::ToolInputSchema;

    #[test]
    fn test_messages_mapping() {
        let messages = vec![
            Message::user_text("hi"),
            Message {
                role: Role::Assistant,
                content: vec![ContentBlock::ToolUse {
                    id: "c1".into(),
                    name: "get_pulse".into(),
                    input: json!({}),
                }],
            },
            Message {
                role: Role::User,
                content: vec![ContentBlock::ToolResult {
                    tool_use_id: "c1".into(),
                    content: "{\"pulse\":0.5}".into(),
                    is_error: None,
                }],
            },
        ];
        let out = to_openai_messages("sys", messages);
        assert_eq!(out.len(), 4);
        assert_eq!(out[0]["role"], "system");
        assert_eq!(out[1]["content"], "hi");
        assert!(out[2]["content"].is_null());
        assert_eq!(out[2]["tool_calls"][0]["function"]["arguments"], "{}");
        assert_eq!(out[3]["role"], "tool");
        assert_eq!(out[3]["tool_call_id"], "c1");
    }

    #[test]
    fn test_tools_mapping() {
        let tools = vec![Tool {
            name: "get_mood".into(),
            description: "mood".into(),
            input_schema: ToolInputSchema {
                schema_type: "object".into(),
                properties: json!({}),
                required: vec![],
            },
        }];
        let out = to_openai_tools(&tools);
        assert_eq!(out[0]["function"]["name"], "get_mood");
        assert_eq!(out[0]["function"]["parameters"]["type"], "object");
    }

    #[test]
    fn test_parse_response_text_tools_and_usage() {
        let body = json!({
            "choices": [{
                "finish_reason": "tool_calls",
                "message": {
                    "content": "checking",
                    "tool_calls": [{
                        "id": "abc",
                        "function": {"name": "get_memory_recall", "arguments": "{\"k\": 2}"}
                    }]
                }
            }],
            "usage": {"prompt_tokens": 10, "completion_tokens": 5}
        });
        let resp = parse_response(&body).unwrap();
        assert_eq!(resp.content.len(), 2);
        match &resp.content[1] {
            ContentBlock::ToolUse { id, name, input } => {
                assert_eq!(id, "abc");
                assert_eq!(name, "get_memory_recall");
                assert_eq!(input["k"], 2);
            }
            other => panic!("expected tool use, got {:?}", other),
        }
        assert_eq!(resp.usage.unwrap().output_tokens, 5);
    }

    #[test]
    fn test_parse_response_without_choices_is_provider_error() {
        let err = parse_response(&json!({"error": "nope"})).unwrap_err();
        assert_eq!(err.status, None);
        assert!(err.message.contains("malformed"));
    }

    #[test]
    fn test_truncate_body_respects_char_boundary() {
        let body = "é".repeat(400);
        let cut = truncate_body(&body);
        assert!(cut.len() <= MAX_ERROR_BODY);
        assert!(cut.chars().all(|c| c == 'é'));
    }

    #[test]
    fn test_missing_key_rejected_for_hosted_provider() {
        let cfg = LlmConfig {
            api_key_env: "CEREBRAIN_TEST_KEY_THAT_IS_NEVER_SET".into(),
            ..LlmConfig::default()
        };
        assert!(OpenAiClient::new(&cfg).is_err());
        let local = LlmConfig {
            provider: "ollama".into(),
            ..cfg
        };
        assert!(OpenAiClient::new(&local).is_ok());
    }
}
