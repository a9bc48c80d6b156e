//! System prompt assembly.
//!
//! Sections, in order: identity, user context, tools, relevant memory, the
//! brain-matrix description, live state, the skill catalog, response style.
//! Over budget, memory excerpts go first (lowest ranked first), then tool
//! text. Identity and live state are never trimmed.

use crate::state::LiveState;
use cerebrain_core::config::PromptConfig;
use cerebrain_core::BrainIdentity;
use cerebrain_memory::RecalledMemory;

const SEPARATOR: &str = "\n\n---\n\n";
const TRUNCATED: &str = "\n[truncated]";

pub const BRAIN_MATRIX: &str = "# Brain matrix (what you are)\n\
You are not a single chat loop but five cooperating parts:\n\
- Emotional self: a bounded mood (valence, arousal, dominance) with trait weights, drifting back to baseline.\n\
- Logical self: you, reasoning over this prompt.\n\
- Memory: a short-term buffer of recent turns plus long-term similarity recall.\n\
- Inspiration: transient sparks drawn from natural randomness; they fade after a while.\n\
- Consciousness: a pulse and stream levels derived from the other four.\n\
The live state below is true as of the start of this turn.";

pub struct PromptInputs<'a> {
    pub identity: &'a BrainIdentity,
    pub user_context: &'a str,
    pub tool_text: &'a str,
    /// Best match first.
    pub memory_excerpt: &'a [RecalledMemory],
    pub live_state: &'a LiveState,
    pub skill_catalog: &'a str,
}

#[derive(Debug, Clone)]
pub struct PromptAssembler {
    budget_chars: usize,
    max_reply_sentences: usize,
}

impl Default for PromptAssembler {
    fn default() -> Self {
        Self::new(&PromptConfig::default())
    }
}

impl PromptAssembler {
    pub fn new(config: &PromptConfig) -> Self {
        Self {
            budget_chars: config.context_budget_chars,
            max_reply_sentences: config.max_reply_sentences.max(1),
        }
    }

    pub fn build(&self, inputs: &PromptInputs<'_>) -> String {
        let mut memory: Vec<String> = inputs
            .memory_excerpt
            .iter()
            .map(|m| format!("- {} ({:.2})", m.text.replace('\n', " / "), m.score))
            .collect();
        let mut tools = inputs.tool_text.trim().to_string();

        loop {
            let prompt = self.render(inputs, &memory, &tools);
            let len = prompt.chars().count();
            if len <= self.budget_chars {
                return prompt;
            }
            if memory.pop().is_some() {
                continue;
            }
            if tools.is_empty() {
                tracing::warn!(
                    "System prompt is {} chars, over the {} budget with nothing left to trim",
                    len,
                    self.budget_chars
                );
                return prompt;
            }
            let overflow = len - self.budget_chars;
            let tool_chars = tools.chars().count();
            let keep = tool_chars.saturating_sub(overflow + TRUNCATED.chars().count());
            if keep == 0 || keep >= tool_chars {
                tools.clear();
            } else {
                let cut: String = tools.chars().take(keep).collect();
                tools = format!("{}{}", cut, TRUNCATED);
            }
        }
    }

    fn render(&self, inputs: &PromptInputs<'_>, memory: &[String], tools: &str) -> String {
        let mut sections = vec![inputs.identity.format_context()];
        let user_context = inputs.user_context.trim();
        if !user_context.is_empty() {
            sections.push(format!("# User context\n{}", user_context));
        }
        if !tools.is_empty() {
            sections.push(format!("# Tools\n{}", tools));
        }
        if !memory.is_empty() {
            sections.push(format!("# Relevant memory\n{}", memory.join("\n")));
        }
        sections.push(BRAIN_MATRIX.to_string());
        sections.push(inputs.live_state.render());
        if !inputs.skill_catalog.is_empty() {
            sections.push(inputs.skill_catalog.to_string());
        }
        sections.push(format!(
            "# Response style\nReply as {} in at most {} short sentences. No preamble, no sign-off.",
            inputs.identity.name, self.max_reply_sentences
        ));
        sections.join(SEPARATOR)
    }
}
