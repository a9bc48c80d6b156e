//! Self-skills: the brain's read-mostly APIs over its own state.
//!
//! The registry is a closed set fixed at construction. Dispatch goes
//! name → [`SkillDescriptor`] → validated [`SkillRequest`] → execution, so
//! argument errors are raised before any component is touched.

use crate::api_types::{Tool, ToolInputSchema};
use crate::state::BrainState;
use cerebrain_core::thought::{self, DEFAULT_THOUGHT_CAPACITY, STREAM_NAMES};
use cerebrain_core::{BrainError, BrainResult, EmotionalState, Spark};
use cerebrain_limbic::consciousness::{
    STREAM_CONSCIOUSNESS, STREAM_EMOTIONAL, STREAM_INSPIRATION, STREAM_LOGICAL, STREAM_MEMORY,
};
use cerebrain_limbic::{ConsciousnessIntegrator, InspirationEngine};
use serde_json::{json, Map, Value};

const MAX_RECALL_K: i64 = 20;
const DEFAULT_THOUGHT_LINES: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    String,
    Integer,
}

impl ParamType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Integer => "integer",
        }
    }

    fn accepts(&self, value: &Value) -> bool {
        match self {
            ParamType::String => value.is_string(),
            ParamType::Integer => value.is_i64() || value.is_u64(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub param_type: ParamType,
    pub required: bool,
    pub description: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkillKind {
    GetMood,
    GetMemorySummary,
    RecallMemory,
    SparkInspiration,
    GetPulse,
    GetConsciousnessState,
    GetThoughtStream,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkillDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    pub params: Vec<ParamSpec>,
    pub kind: SkillKind,
    /// The orchestrator folds this skill's delta into the turn's commit.
    pub side_effecting: bool,
}

impl SkillDescriptor {
    pub fn schema(&self) -> Tool {
        let mut properties = Map::new();
        for p in &self.params {
            properties.insert(
                p.name.to_string(),
                json!({ "type": p.param_type.as_str(), "description": p.description }),
            );
        }
        Tool {
            name: self.name.to_string(),
            description: self.description.to_string(),
            input_schema: ToolInputSchema {
                schema_type: "object".to_string(),
                properties: Value::Object(properties),
                required: self
                    .params
                    .iter()
                    .filter(|p| p.required)
                    .map(|p| p.name.to_string())
                    .collect(),
            },
        }
    }

    /// `name(query: string?, k: integer?)`
    pub fn signature(&self) -> String {
        let params = self
            .params
            .iter()
            .map(|p| {
                format!(
                    "{}: {}{}",
                    p.name,
                    p.param_type.as_str(),
                    if p.required { "" } else { "?" }
                )
            })
            .collect::<Vec<_>>()
            .join(", ");
        format!("{}({})", self.name, params)
    }
}

/// A skill call whose arguments have passed validation.
#[derive(Debug, Clone, PartialEq)]
pub enum SkillRequest {
    GetMood,
    GetMemorySummary,
    RecallMemory { query: Option<String>, k: Option<usize> },
    SparkInspiration,
    GetPulse,
    GetConsciousnessState,
    GetThoughtStream { stream: String, n: usize },
}

/// State change a side-effecting skill asks the orchestrator to commit.
#[derive(Debug, Clone, PartialEq)]
pub enum SkillDelta {
    Spark(Spark),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkillOutput {
    pub content: String,
    pub delta: Option<SkillDelta>,
}

impl SkillOutput {
    fn read(content: String) -> Self {
        Self { content, delta: None }
    }
}

/// Read-only view a skill executes against.
pub struct SkillContext<'a> {
    pub state: &'a BrainState,
    pub mood: EmotionalState,
    pub engine: &'a InspirationEngine,
    pub integrator: &'a ConsciousnessIntegrator,
    /// Default recall query when the model gives none (the user's text).
    pub query_hint: &'a str,
    pub recall_k: usize,
    pub now: i64,
}

impl<'a> SkillContext<'a> {
    pub fn new(
        state: &'a BrainState,
        engine: &'a InspirationEngine,
        integrator: &'a ConsciousnessIntegrator,
        query_hint: &'a str,
        recall_k: usize,
        now: i64,
    ) -> Self {
        Self {
            mood: state.emotional.current(),
            state,
            engine,
            integrator,
            query_hint,
            recall_k,
            now,
        }
    }
}

// ============================================================================
// SkillRegistry
// ============================================================================

#[derive(Debug, Clone)]
pub struct SkillRegistry {
    descriptors: Vec<SkillDescriptor>,
}

impl Default for SkillRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SkillRegistry {
    pub fn new() -> Self {
        let descriptors = vec![
            SkillDescriptor {
                name: "get_mood",
                description: "Return the current mood: valence, arousal, dominance and trait weights.",
                params: Vec::new(),
                kind: SkillKind::GetMood,
                side_effecting: false,
            },
            SkillDescriptor {
                name: "get_memory_summary",
                description: "Return short-term and long-term memory counts.",
                params: Vec::new(),
                kind: SkillKind::GetMemorySummary,
                side_effecting: false,
            },
            SkillDescriptor {
                name: "get_memory_recall",
                description: "Query long-term memory. Returns up to k recalled items, best match first.",
                params: vec![
                    ParamSpec {
                        name: "query",
                        param_type: ParamType::String,
                        required: false,
                        description: "What to recall. Defaults to the current message.",
                    },
                    ParamSpec {
                        name: "k",
                        param_type: ParamType::Integer,
                        required: false,
                        description: "How many items (1-20).",
                    },
                ],
                kind: SkillKind::RecallMemory,
                side_effecting: false,
            },
            SkillDescriptor {
                name: "spark_inspiration",
                description: "Trigger the inspiration engine once. Returns a spark if one fires.",
                params: Vec::new(),
                kind: SkillKind::SparkInspiration,
                side_effecting: true,
            },
            SkillDescriptor {
                name: "get_pulse",
                description: "Return the consciousness pulse (0..1).",
                params: Vec::new(),
                kind: SkillKind::GetPulse,
                side_effecting: false,
            },
            SkillDescriptor {
                name: "get_consciousness_state",
                description: "Return activity levels of all streams (emotional, logical, memory, inspiration, consciousness).",
                params: Vec::new(),
                kind: SkillKind::GetConsciousnessState,
                side_effecting: false,
            },
            SkillDescriptor {
                name: "get_thought_stream",
                description: "Return recent thought lines from one stream, oldest first.",
                params: vec![
                    ParamSpec {
                        name: "stream",
                        param_type: ParamType::String,
                        required: false,
                        description: "emotional, logical, memory, inspiration or consciousness (default).",
                    },
                    ParamSpec {
                        name: "n",
                        param_type: ParamType::Integer,
                        required: false,
                        description: "How many lines (1-24, default 5).",
                    },
                ],
                kind: SkillKind::GetThoughtStream,
                side_effecting: false,
            },
        ];
        Self { descriptors }
    }

    /// Stable order, used verbatim in the prompt and the tool schema.
    pub fn list(&self) -> &[SkillDescriptor] {
        &self.descriptors
    }

    pub fn names(&self) -> Vec<String> {
        self.descriptors.iter().map(|d| d.name.to_string()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&SkillDescriptor> {
        self.descriptors.iter().find(|d| d.name == name)
    }

    pub fn available_tools(&self) -> Vec<Tool> {
        self.descriptors.iter().map(|d| d.schema()).collect()
    }

    /// Catalog block for the system prompt.
    pub fn catalog_text(&self) -> String {
        let mut lines = vec![
            "# Self skills".to_string(),
            "Internal APIs over your own state. Call one when you need fresh state or want to trigger inspiration."
                .to_string(),
            String::new(),
        ];
        for d in &self.descriptors {
            let marker = if d.side_effecting { " [side-effecting]" } else { "" };
            lines.push(format!("- {}: {}{}", d.signature(), d.description, marker));
        }
        lines.push(String::new());
        lines.push(
            "If native tool calls are unavailable, write: [TOOL_CALL] {tool => \"skill_name\", args => {key => value}} [/TOOL_CALL]"
                .to_string(),
        );
        lines.join("\n")
    }

    /// Check `args` against the descriptor. Unknown keys are ignored.
    pub fn validate(&self, name: &str, args: &Value) -> BrainResult<SkillRequest> {
        let descriptor = self.get(name).ok_or_else(|| BrainError::UnknownSkill {
            name: name.to_string(),
            known: self.names(),
        })?;

        let empty = Map::new();
        let map = match args {
            Value::Null => &empty,
            Value::Object(m) => m,
            other => {
                return Err(BrainError::invalid_argument(
                    name,
                    format!("arguments must be an object, got {}", other),
                ))
            }
        };

        for key in map.keys() {
            if !descriptor.params.iter().any(|p| p.name == key) {
                tracing::debug!("Skill '{}': ignoring unknown argument '{}'", name, key);
            }
        }
        for p in &descriptor.params {
            match map.get(p.name) {
                Some(Value::Null) | None if p.required => {
                    return Err(BrainError::invalid_argument(
                        name,
                        format!("missing required argument '{}'", p.name),
                    ))
                }
                Some(v) if !v.is_null() && !p.param_type.accepts(v) => {
                    return Err(BrainError::invalid_argument(
                        name,
                        format!("'{}' must be {}, got {}", p.name, p.param_type.as_str(), v),
                    ))
                }
                _ => {}
            }
        }

        Ok(match descriptor.kind {
            SkillKind::GetMood => SkillRequest::GetMood,
            SkillKind::GetMemorySummary => SkillRequest::GetMemorySummary,
            SkillKind::RecallMemory => {
                let query = map
                    .get("query")
                    .and_then(|v| v.as_str())
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty());
                let k = match map.get("k").and_then(|v| v.as_i64()) {
                    Some(k) if (1..=MAX_RECALL_K).contains(&k) => Some(k as usize),
                    Some(k) => {
                        return Err(BrainError::invalid_argument(
                            name,
                            format!("'k' must be between 1 and {}, got {}", MAX_RECALL_K, k),
                        ))
                    }
                    None if map.get("k").is_some_and(|v| !v.is_null()) => {
                        return Err(BrainError::invalid_argument(
                            name,
                            format!("'k' must be between 1 and {}", MAX_RECALL_K),
                        ))
                    }
                    None => None,
                };
                SkillRequest::RecallMemory { query, k }
            }
            SkillKind::SparkInspiration => SkillRequest::SparkInspiration,
            SkillKind::GetPulse => SkillRequest::GetPulse,
            SkillKind::GetConsciousnessState => SkillRequest::GetConsciousnessState,
            SkillKind::GetThoughtStream => {
                let stream = map
                    .get("stream")
                    .and_then(|v| v.as_str())
                    .map(|s| s.trim().to_lowercase())
                    .filter(|s| !s.is_empty())
                    .unwrap_or_else(|| STREAM_CONSCIOUSNESS.to_string());
                if !thought::is_stream(&stream) {
                    return Err(BrainError::invalid_argument(
                        name,
                        format!(
                            "'stream' must be one of {}, got '{}'",
                            STREAM_NAMES.join(", "),
                            stream
                        ),
                    ));
                }
                let max = DEFAULT_THOUGHT_CAPACITY as i64;
                let n = match map.get("n") {
                    None | Some(Value::Null) => DEFAULT_THOUGHT_LINES,
                    Some(v) => match v.as_i64() {
                        Some(n) if (1..=max).contains(&n) => n as usize,
                        _ => {
                            return Err(BrainError::invalid_argument(
                                name,
                                format!("'n' must be between 1 and {}, got {}", max, v),
                            ))
                        }
                    },
                };
                SkillRequest::GetThoughtStream { stream, n }
            }
        })
    }

    /// Validate then execute. Never mutates the state in `ctx`; the
    /// side-effecting skill reports its change as a [`SkillDelta`].
    pub async fn invoke(
        &self,
        name: &str,
        args: &Value,
        ctx: &SkillContext<'_>,
    ) -> BrainResult<SkillOutput> {
        let request = self.validate(name, args)?;
        Ok(execute(request, ctx).await)
    }
}

async fn execute(request: SkillRequest, ctx: &SkillContext<'_>) -> SkillOutput {
    match request {
        SkillRequest::GetMood => SkillOutput::read(format!("Mood: {}", ctx.mood.summary())),
        SkillRequest::GetMemorySummary => {
            let s = ctx.state.memory.summary().await;
            SkillOutput::read(format!(
                "Memory: short_term={}/{} items, long_term={} entries.",
                s.short_term, s.short_term_capacity, s.long_term
            ))
        }
        SkillRequest::RecallMemory { query, k } => {
            let q = query.unwrap_or_else(|| ctx.query_hint.trim().to_string());
            let k = k.unwrap_or(ctx.recall_k);
            let hits = ctx.state.memory.recall(&q, k).await;
            if hits.is_empty() {
                SkillOutput::read(format!("Recall('{}'): no matches.", q))
            } else {
                let items = hits
                    .iter()
                    .map(|h| format!("{} ({:.2})", h.text.replace('\n', " / "), h.score))
                    .collect::<Vec<_>>()
                    .join(" | ");
                SkillOutput::read(format!("Recall('{}'): {}", q, items))
            }
        }
        SkillRequest::SparkInspiration => match ctx.engine.draw(ctx.now).await {
            Some(spark) => SkillOutput {
                content: format!("Inspiration: {} (strength {:.2})", spark.label, spark.strength),
                delta: Some(SkillDelta::Spark(spark)),
            },
            None => SkillOutput::read("Inspiration: (no spark this time)".to_string()),
        },
        SkillRequest::GetPulse => {
            let pulse = ctx.integrator.pulse(&ctx.state.pulse_inputs(&ctx.mood));
            SkillOutput::read(format!("Pulse: {:.2}", pulse.pulse))
        }
        SkillRequest::GetConsciousnessState => {
            let pulse = ctx.integrator.pulse(&ctx.state.pulse_inputs(&ctx.mood));
            let level = |name: &str| pulse.streams.get(name).copied().unwrap_or(0.0);
            SkillOutput::read(format!(
                "Consciousness: emotional={:.2} logical={:.2} memory={:.2} inspiration={:.2} consciousness={:.2}",
                level(STREAM_EMOTIONAL),
                level(STREAM_LOGICAL),
                level(STREAM_MEMORY),
                level(STREAM_INSPIRATION),
                level(STREAM_CONSCIOUSNESS),
            ))
        }
        SkillRequest::GetThoughtStream { stream, n } => {
            let lines = ctx.state.thoughts.recent(&stream, n);
            let body = if lines.is_empty() {
                "(empty)".to_string()
            } else {
                lines.join("; ")
            };
            SkillOutput::read(format!("Thought stream ({}): {}", stream, body))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use cerebrain_core::config::InspirationConfig;
    use cerebrain_core::EmotionalSelf;
    use cerebrain_limbic::RandomnessSource;
    use cerebrain_memory::MemoryStore;
    use std::sync::Arc;

    struct Constant(f64);

    #[async_trait]
    impl RandomnessSource for Constant {
        async fn next_float(&self) -> f64 {
            self.0
        }
    }

    fn fixture() -> (BrainState, InspirationEngine, ConsciousnessIntegrator) {
        (
            BrainState::new(EmotionalSelf::default(), MemoryStore::new(7)),
            InspirationEngine::new(Arc::new(Constant(0.1)), InspirationConfig::default()),
            ConsciousnessIntegrator::default(),
        )
    }

    #[test]
    fn test_list_order_is_stable() {
        let names = SkillRegistry::new().names();
        assert_eq!(
            names,
            vec![
                "get_mood",
                "get_memory_summary",
                "get_memory_recall",
                "spark_inspiration",
                "get_pulse",
                "get_consciousness_state",
                "get_thought_stream"
            ]
        );
        let tools = SkillRegistry::new().available_tools();
        assert_eq!(tools.len(), 7);
        assert_eq!(tools[2].input_schema.properties["k"]["type"], "integer");
        assert!(tools[2].input_schema.required.is_empty());
    }

    #[test]
    fn test_only_spark_is_side_effecting() {
        let registry = SkillRegistry::new();
        let side: Vec<_> = registry
            .list()
            .iter()
            .filter(|d| d.side_effecting)
            .map(|d| d.name)
            .collect();
        assert_eq!(side, vec!["spark_inspiration"]);
    }

    #[test]
    fn test_validate_unknown_skill() {
        let err = SkillRegistry::new()
            .validate("read_minds", &json!({}))
            .unwrap_err();
        match err {
            BrainError::UnknownSkill { name, known } => {
                assert_eq!(name, "read_minds");
                assert_eq!(known.len(), 7);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_validate_types_and_ranges() {
        let registry = SkillRegistry::new();
        assert!(matches!(
            registry.validate("get_memory_recall", &json!({"k": "three"})),
            Err(BrainError::InvalidSkillArgument { .. })
        ));
        assert!(matches!(
            registry.validate("get_memory_recall", &json!({"k": 0})),
            Err(BrainError::InvalidSkillArgument { .. })
        ));
        assert!(matches!(
            registry.validate("get_pulse", &json!([1, 2])),
            Err(BrainError::InvalidSkillArgument { .. })
        ));
        assert_eq!(
            registry
                .validate("get_memory_recall", &json!({"query": " tea ", "k": 2, "extra": true}))
                .unwrap(),
            SkillRequest::RecallMemory {
                query: Some("tea".into()),
                k: Some(2)
            }
        );
        assert_eq!(
            registry.validate("get_pulse", &Value::Null).unwrap(),
            SkillRequest::GetPulse
        );
    }

    #[tokio::test]
    async fn test_get_pulse_is_deterministic() {
        let (state, engine, integrator) = fixture();
        let registry = SkillRegistry::new();
        let ctx = SkillContext::new(&state, &engine, &integrator, "", 3, 0);
        let a = registry.invoke("get_pulse", &json!({}), &ctx).await.unwrap();
        let b = registry.invoke("get_pulse", &json!({}), &ctx).await.unwrap();
        assert_eq!(a, b);
        // 0.4 * arousal 0.4, empty memory, no sparks
        assert_eq!(a.content, "Pulse: 0.16");
    }

    #[tokio::test]
    async fn test_spark_skill_returns_delta_without_touching_state() {
        let (state, engine, integrator) = fixture();
        let registry = SkillRegistry::new();
        let ctx = SkillContext::new(&state, &engine, &integrator, "", 3, 42);
        let out = registry
            .invoke("spark_inspiration", &json!({}), &ctx)
            .await
            .unwrap();
        match out.delta {
            Some(SkillDelta::Spark(spark)) => assert_eq!(spark.created_at, 42),
            None => panic!("expected a spark delta"),
        }
        assert_eq!(state.inspiration.active_count(), 0);
    }

    #[tokio::test]
    async fn test_recall_without_long_term_reports_no_matches() {
        let (state, engine, integrator) = fixture();
        let ctx = SkillContext::new(&state, &engine, &integrator, "bees", 3, 0);
        let out = SkillRegistry::new()
            .invoke("get_memory_recall", &json!({}), &ctx)
            .await
            .unwrap();
        assert_eq!(out.content, "Recall('bees'): no matches.");
    }

    #[test]
    fn test_thought_stream_arguments_validated() {
        let registry = SkillRegistry::new();
        assert_eq!(
            registry.validate("get_thought_stream", &json!({})).unwrap(),
            SkillRequest::GetThoughtStream {
                stream: "consciousness".into(),
                n: 5
            }
        );
        assert_eq!(
            registry
                .validate("get_thought_stream", &json!({"stream": " Memory ", "n": 24}))
                .unwrap(),
            SkillRequest::GetThoughtStream {
                stream: "memory".into(),
                n: 24
            }
        );
        for bad in [
            json!({"stream": "dreams"}),
            json!({"n": 0}),
            json!({"n": 25}),
            json!({"n": -1}),
            json!({"stream": 3}),
        ] {
            assert!(matches!(
                registry.validate("get_thought_stream", &bad),
                Err(BrainError::InvalidSkillArgument { .. })
            ));
        }
    }

    #[tokio::test]
    async fn test_thought_stream_reads_recent_lines() {
        let (mut state, engine, integrator) = fixture();
        let registry = SkillRegistry::new();
        {
            let ctx = SkillContext::new(&state, &engine, &integrator, "", 3, 0);
            let out = registry
                .invoke("get_thought_stream", &json!({"stream": "logical"}), &ctx)
                .await
                .unwrap();
            assert_eq!(out.content, "Thought stream (logical): (empty)");
        }
        for line in ["integrating...", "done", "integrating...", "done"] {
            state.thoughts.push(STREAM_CONSCIOUSNESS, line);
        }
        let ctx = SkillContext::new(&state, &engine, &integrator, "", 3, 0);
        let out = registry
            .invoke("get_thought_stream", &json!({"n": 2}), &ctx)
            .await
            .unwrap();
        assert_eq!(out.content, "Thought stream (consciousness): integrating...; done");
        assert!(out.delta.is_none());
    }

    #[test]
    fn test_catalog_text_lists_signatures() {
        let text = SkillRegistry::new().catalog_text();
        assert!(text.starts_with("# Self skills"));
        assert!(text.contains("- get_memory_recall(query: string?, k: integer?):"));
        assert!(text.contains("spark_inspiration(): Trigger"));
        assert!(text.contains("[side-effecting]"));
        assert!(text.contains("- get_thought_stream(stream: string?, n: integer?):"));
    }
}
