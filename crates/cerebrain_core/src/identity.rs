use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;

use crate::config::LlmConfig;

/// Fallback SOUL when a brain workspace has none.
fn default_soul(name: &str) -> String {
    format!(
        "You are {name}, a brain matrix: emotional self, logical self, memory, inspiration \
         and consciousness working as one. Curious, calm, precise. You speak briefly and \
         plainly, like a ship computer that happens to have moods."
    )
}

/// Default LLM settings carried by the identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmDefaults {
    pub provider: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl From<&LlmConfig> for LlmDefaults {
    fn from(cfg: &LlmConfig) -> Self {
        Self {
            provider: cfg.provider.clone(),
            model: cfg.model.clone(),
            max_tokens: cfg.max_tokens,
            temperature: cfg.temperature,
        }
    }
}

impl Default for LlmDefaults {
    fn default() -> Self {
        Self::from(&LlmConfig::default())
    }
}

/// BrainIdentity: immutable after creation.
///
/// Created at init time, reloaded from persisted session state at startup.
/// The orchestrator only ever reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrainIdentity {
    pub name: String,
    /// Traits, values and communication style.
    pub soul: String,
    pub llm: LlmDefaults,
}

impl BrainIdentity {
    pub fn new(name: impl Into<String>, soul: impl Into<String>, llm: LlmDefaults) -> Self {
        let name = name.into();
        let soul = soul.into();
        let soul = if soul.trim().is_empty() {
            default_soul(&name)
        } else {
            soul.trim().to_string()
        };
        Self { name, soul, llm }
    }

    /// Identity block used as the first layer of the system prompt.
    pub fn format_context(&self) -> String {
        format!("# Identity (SOUL)\nName: {}\n{}", self.name, self.soul)
    }
}

/// Per-brain workspace texts that sit next to the identity.
/// Missing files produce empty strings (graceful degradation).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkspaceTexts {
    /// SOUL.md
    pub soul: String,
    /// USER.md: who the brain is talking to.
    pub user_context: String,
    /// TOOLS.md: free-text tool notes.
    pub tool_text: String,
}

impl WorkspaceTexts {
    pub async fn load<P: AsRef<Path>>(root: P) -> anyhow::Result<Self> {
        let root = root.as_ref();

        let (soul, user_context, tool_text) = tokio::join!(
            read_file(root.join("SOUL.md")),
            read_file(root.join("USER.md")),
            read_file(root.join("TOOLS.md")),
        );

        Ok(Self {
            soul: soul?,
            user_context: user_context?,
            tool_text: tool_text?,
        })
    }
}

async fn read_file<P: AsRef<Path>>(path: P) -> anyhow::Result<String> {
    match fs::read_to_string(&path).await {
        Ok(content) => Ok(content.trim().to_string()),
        Err(_) => Ok(String::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_empty_soul_gets_default() {
        let identity = BrainIdentity::new("Cerebra", "   ", LlmDefaults::default());
        assert!(identity.soul.contains("Cerebra"));
        assert!(identity.soul.contains("brain matrix"));
    }

    #[test]
    fn test_identity_format_context() {
        let identity = BrainIdentity::new("Nova", "Warm and direct.", LlmDefaults::default());
        let ctx = identity.format_context();
        assert!(ctx.starts_with("# Identity (SOUL)"));
        assert!(ctx.contains("Name: Nova"));
        assert!(ctx.contains("Warm and direct."));
    }

    #[tokio::test]
    async fn test_workspace_texts_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("SOUL.md"), "  I am curious.\n").unwrap();
        let texts = WorkspaceTexts::load(dir.path()).await.unwrap();
        assert_eq!(texts.soul, "I am curious.");
        assert!(texts.user_context.is_empty());
        assert!(texts.tool_text.is_empty());
    }
}
