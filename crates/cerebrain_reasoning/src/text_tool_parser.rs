//! Parse skill calls from plain-text LLM output.
//!
//! Models without native tool use (or proxies that strip it) write calls
//! inline. Two formats are recognised:
//!
//! 1. `[TOOL_CALL] {tool => "get_pulse", args => {k => 2}} [/TOOL_CALL]`
//! 2. `<tool_call>{"name":"get_pulse","arguments":{}}</tool_call>`
//!
//! Both are normalised to [`ParsedToolCall`] and stripped from visible text.

use regex::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;

static RE_ARROW_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?si)\[\s*TOOL_CALL\s*\](.*?)\[\s*/\s*TOOL_CALL\s*\]").unwrap());
static RE_ARROW_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)tool\s*=>\s*["']([^"']+)["']"#).unwrap());
static RE_ARROW_ARGS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?si)args\s*=>\s*\{([^}]*)\}").unwrap());
static RE_TAG_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?si)<\s*tool_call\s*>(.*?)<\s*/\s*tool_call\s*>").unwrap());
static RE_MULTI_NEWLINE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").unwrap());

/// A skill call parsed from plain text.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedToolCall {
    pub name: String,
    pub input: Value,
}

/// Extract every skill call in text order.
pub fn parse_text_tool_calls(text: &str) -> Vec<ParsedToolCall> {
    let mut found: Vec<(usize, ParsedToolCall)> = Vec::new();

    for caps in RE_ARROW_BLOCK.captures_iter(text) {
        let (Some(whole), Some(inner)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        if let Some(call) = parse_arrow_block(inner.as_str()) {
            found.push((whole.start(), call));
        }
    }

    for caps in RE_TAG_BLOCK.captures_iter(text) {
        let (Some(whole), Some(inner)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        if let Some(call) = try_parse_tool_json(inner.as_str().trim()) {
            found.push((whole.start(), call));
        }
    }

    found.sort_by_key(|(pos, _)| *pos);
    found.into_iter().map(|(_, call)| call).collect()
}

/// Remove all skill-call markup and tidy the whitespace it leaves behind.
pub fn strip_tool_calls(text: &str) -> String {
    let result = RE_ARROW_BLOCK.replace_all(text, "");
    let result = RE_TAG_BLOCK.replace_all(&result, "");
    RE_MULTI_NEWLINE
        .replace_all(&result, "\n\n")
        .trim()
        .to_string()
}

/// `tool => "name", args => {k => v, ...}`. Values that are all digits
/// become integers; everything else stays a string.
fn parse_arrow_block(block: &str) -> Option<ParsedToolCall> {
    let name = RE_ARROW_NAME.captures(block)?.get(1)?.as_str().trim().to_string();
    if name.is_empty() {
        return None;
    }

    let mut args = Map::new();
    if let Some(inner) = RE_ARROW_ARGS.captures(block).and_then(|c| c.get(1)) {
        for part in inner.as_str().split(',') {
            let Some((k, v)) = part.split_once("=>") else {
                continue;
            };
            let key = k.trim().trim_matches(|c| c == '"' || c == '\'');
            if key.is_empty() {
                continue;
            }
            let raw = v.trim().trim_matches(|c| c == '"' || c == '\'');
            let value = if !raw.is_empty() && raw.chars().all(|c| c.is_ascii_digit()) {
                raw.parse::<u64>()
                    .map(Value::from)
                    .unwrap_or_else(|_| Value::String(raw.to_string()))
            } else {
                Value::String(raw.to_string())
            };
            args.insert(key.to_string(), value);
        }
    }

    Some(ParsedToolCall {
        name,
        input: Value::Object(args),
    })
}

/// Normalises field names: `tool` → `name`, `arguments`/`parameters` → `input`.
fn try_parse_tool_json(json_str: &str) -> Option<ParsedToolCall> {
    let obj: Value = serde_json::from_str(json_str).ok()?;
    let map = obj.as_object()?;

    let name = map
        .get("name")
        .or_else(|| map.get("tool"))
        .and_then(|v| v.as_str())?
        .trim()
        .to_string();
    if name.is_empty() {
        return None;
    }

    let input = map
        .get("input")
        .or_else(|| map.get("arguments"))
        .or_else(|| map.get("parameters"))
        .cloned()
        .unwrap_or(Value::Object(Map::new()));

    Some(ParsedToolCall { name, input })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_arrow_block_without_args() {
        let text = "Let me check.\n[TOOL_CALL]\n{tool => \"get_pulse\", args => {}}\n[/TOOL_CALL]";
        let calls = parse_text_tool_calls(text);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "get_pulse");
        assert_eq!(calls[0].input, serde_json::json!({}));
    }

    #[test]
    fn test_parse_arrow_block_args_digits_become_ints() {
        let text = r#"[TOOL_CALL] {tool => "get_memory_recall", args => {query => "tea", k => 2}} [/TOOL_CALL]"#;
        let calls = parse_text_tool_calls(text);
        assert_eq!(calls[0].input["query"], "tea");
        assert_eq!(calls[0].input["k"], 2);
    }

    #[test]
    fn test_parse_tag_with_arguments() {
        let text = r#"<tool_call>{"name":"get_mood","arguments":{}}</tool_call>"#;
        let calls = parse_text_tool_calls(text);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "get_mood");
    }

    #[test]
    fn test_parse_tag_with_tool_key_and_input() {
        let text = r#"<tool_call>{"tool":"get_memory_recall","input":{"k":1}}</tool_call>"#;
        let calls = parse_text_tool_calls(text);
        assert_eq!(calls[0].name, "get_memory_recall");
        assert_eq!(calls[0].input["k"], 1);
    }

    #[test]
    fn test_mixed_formats_keep_text_order() {
        let text = concat!(
            r#"<tool_call>{"name":"get_mood"}</tool_call> then "#,
            r#"[TOOL_CALL]{tool => 'get_pulse'}[/TOOL_CALL]"#
        );
        let names: Vec<_> = parse_text_tool_calls(text)
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["get_mood", "get_pulse"]);
    }

    #[test]
    fn test_invalid_json_tag_ignored() {
        assert!(parse_text_tool_calls("<tool_call>{not json}</tool_call>").is_empty());
        assert!(parse_text_tool_calls("[TOOL_CALL] nothing here [/TOOL_CALL]").is_empty());
    }

    #[test]
    fn test_no_calls_in_plain_text() {
        assert!(parse_text_tool_calls("Just a reply. tool => nothing").is_empty());
    }

    #[test]
    fn test_strip_removes_markup() {
        let text = "Checking.\n\n\n[TOOL_CALL]{tool => \"get_pulse\"}[/TOOL_CALL]\n\n\nDone. <tool_call>{\"name\":\"x\"}</tool_call>";
        assert_eq!(strip_tool_calls(text), "Checking.\n\nDone.");
    }

    #[test]
    fn test_strip_leaves_plain_text_alone() {
        assert_eq!(strip_tool_calls("  Online.  "), "Online.");
    }
}
