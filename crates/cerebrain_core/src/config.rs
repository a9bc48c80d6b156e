use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

// ============================================================================
// Top-level config
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CerebrainConfig {
    pub llm: LlmConfig,
    pub memory: MemoryConfig,
    pub emotion: EmotionConfig,
    pub inspiration: InspirationConfig,
    pub consciousness: ConsciousnessConfig,
    pub orchestrator: OrchestratorConfig,
    pub prompt: PromptConfig,
    pub randomness: RandomnessConfig,
}

impl CerebrainConfig {
    /// Load config from a TOML file, falling back to defaults for missing fields.
    /// After loading, env var overrides are applied.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;
        let mut config: CerebrainConfig =
            toml::from_str(&content).with_context(|| "Failed to parse TOML config")?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Try to load from path; if file doesn't exist, return defaults with env overrides.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::load(path) {
            Ok(cfg) => cfg,
            Err(e) => {
                tracing::info!("Config file not found or invalid ({}), using defaults", e);
                let mut cfg = Self::default();
                cfg.apply_env_overrides();
                cfg
            }
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("CEREBRAIN_PROVIDER") {
            self.llm.provider = v;
        }
        if let Ok(v) = std::env::var("CEREBRAIN_MODEL") {
            self.llm.model = v;
        }
        if let Ok(v) = std::env::var("CEREBRAIN_API_BASE") {
            self.llm.api_base = Some(v);
        }
        if let Ok(v) = std::env::var("CEREBRAIN_MAX_TOKENS") {
            if let Ok(n) = v.parse() {
                self.llm.max_tokens = n;
            }
        }
        if let Ok(v) = std::env::var("CEREBRAIN_TEMPERATURE") {
            if let Ok(n) = v.parse() {
                self.llm.temperature = n;
            }
        }
        if let Ok(v) = std::env::var("CEREBRAIN_CONTEXT_BUDGET") {
            if let Ok(n) = v.parse() {
                self.prompt.context_budget_chars = n;
            }
        }
    }
}

// ============================================================================
// Sub-configs
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: String,
    pub model: String,
    /// Overrides the provider's well-known base URL.
    pub api_base: Option<String>,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "openrouter".to_string(),
            model: "minimax/minimax-m2".to_string(),
            api_base: None,
            api_key_env: "OPENROUTER_API_KEY".to_string(),
            max_tokens: 8192,
            temperature: 0.7,
        }
    }
}

impl LlmConfig {
    /// Base URL for the configured provider (OpenAI-compatible endpoints).
    pub fn resolved_api_base(&self) -> String {
        if let Some(ref base) = self.api_base {
            return base.trim_end_matches('/').to_string();
        }
        match self.provider.to_lowercase().as_str() {
            "openai" => "https://api.openai.com/v1",
            "ollama" => "http://localhost:11434/v1",
            "local" => "http://localhost:5000/v1",
            _ => "https://openrouter.ai/api/v1",
        }
        .to_string()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    pub short_term_capacity: usize,
    /// How many long-term excerpts are recalled into the system prompt.
    pub recall_k: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            short_term_capacity: 7,
            recall_k: 3,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EmotionConfig {
    /// Fraction of the distance to baseline removed per elapsed turn.
    pub decay_rate: f32,
    /// Mood drift applied per committed turn (curious on questions, creative on long replies).
    pub interaction_nudge: f32,
}

impl Default for EmotionConfig {
    fn default() -> Self {
        Self {
            decay_rate: 0.1,
            interaction_nudge: 0.02,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InspirationConfig {
    /// A spark is generated when the drawn float is below this value.
    pub trigger_threshold: f64,
    pub spark_ttl_secs: i64,
    pub max_active: usize,
    /// Creativity nudge per unit of spark strength when a spark is committed.
    pub creativity_nudge: f32,
}

impl Default for InspirationConfig {
    fn default() -> Self {
        Self {
            trigger_threshold: 0.7,
            spark_ttl_secs: 600,
            max_active: 5,
            creativity_nudge: 0.05,
        }
    }
}

/// Weights for the pulse/stream derivation. The three weights are
/// normalised at use, so they need not sum to one.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ConsciousnessConfig {
    pub arousal_weight: f32,
    pub memory_weight: f32,
    pub inspiration_weight: f32,
    /// Active spark count at which the inspiration stream saturates.
    pub spark_saturation: usize,
    /// Recent user turn count at which the logical stream saturates.
    pub logical_saturation: usize,
}

impl Default for ConsciousnessConfig {
    fn default() -> Self {
        Self {
            arousal_weight: 0.4,
            memory_weight: 0.3,
            inspiration_weight: 0.3,
            spark_saturation: 3,
            logical_saturation: 4,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Skill-dispatch rounds per turn; failed calls count like any other.
    pub max_skill_rounds: usize,
    pub llm_timeout_secs: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_skill_rounds: 3,
            llm_timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PromptConfig {
    /// Ceiling for the assembled system prompt, in characters (~4 chars per token).
    pub context_budget_chars: usize,
    pub max_reply_sentences: usize,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            context_budget_chars: 24_000,
            max_reply_sentences: 3,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RandomnessConfig {
    /// Remote providers in priority order. Known: "anu_quantum", "random_org".
    pub providers: Vec<String>,
    pub timeout_ms: u64,
}

impl Default for RandomnessConfig {
    fn default() -> Self {
        Self {
            providers: vec!["anu_quantum".to_string(), "random_org".to_string()],
            timeout_ms: 2000,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = CerebrainConfig::default();
        assert_eq!(cfg.llm.provider, "openrouter");
        assert_eq!(cfg.memory.short_term_capacity, 7);
        assert_eq!(cfg.orchestrator.max_skill_rounds, 3);
        assert!((cfg.inspiration.trigger_threshold - 0.7).abs() < f64::EPSILON);
    }

    #[test]
    fn test_parse_minimal_toml() {
        let toml_str = r#"
[llm]
provider = "openai"
model = "gpt-4o-mini"
"#;
        let cfg: CerebrainConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.llm.provider, "openai");
        assert_eq!(cfg.llm.model, "gpt-4o-mini");
        // Defaults for unspecified fields
        assert_eq!(cfg.llm.max_tokens, 8192);
        assert_eq!(cfg.memory.recall_k, 3);
    }

    #[test]
    fn test_parse_full_toml() {
        let toml_str = r#"
[llm]
provider = "ollama"
model = "llama3"
api_base = "http://gpu-box:11434/v1/"
api_key_env = "OLLAMA_KEY"
max_tokens = 1024
temperature = 0.2

[memory]
short_term_capacity = 2
recall_k = 5

[emotion]
decay_rate = 0.25
interaction_nudge = 0.05

[inspiration]
trigger_threshold = 0.5
spark_ttl_secs = 30
max_active = 2
creativity_nudge = 0.1

[consciousness]
arousal_weight = 1.0
memory_weight = 0.0
inspiration_weight = 0.0
spark_saturation = 1
logical_saturation = 2

[orchestrator]
max_skill_rounds = 5
llm_timeout_secs = 10

[prompt]
context_budget_chars = 4000
max_reply_sentences = 2

[randomness]
providers = ["random_org"]
timeout_ms = 500
"#;
        let cfg: CerebrainConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.llm.resolved_api_base(), "http://gpu-box:11434/v1");
        assert_eq!(cfg.memory.short_term_capacity, 2);
        assert_eq!(cfg.inspiration.spark_ttl_secs, 30);
        assert_eq!(cfg.consciousness.logical_saturation, 2);
        assert_eq!(cfg.orchestrator.max_skill_rounds, 5);
        assert_eq!(cfg.prompt.context_budget_chars, 4000);
        assert_eq!(cfg.randomness.providers, vec!["random_org".to_string()]);
    }

    #[test]
    fn test_resolved_api_base_per_provider() {
        let mut llm = LlmConfig::default();
        assert_eq!(llm.resolved_api_base(), "https://openrouter.ai/api/v1");
        llm.provider = "OpenAI".into();
        assert_eq!(llm.resolved_api_base(), "https://api.openai.com/v1");
        llm.provider = "local".into();
        assert_eq!(llm.resolved_api_base(), "http://localhost:5000/v1");
    }

    #[test]
    fn test_env_overrides_and_defaults() {
        std::env::set_var("CEREBRAIN_PROVIDER", "openai");
        std::env::set_var("CEREBRAIN_MAX_TOKENS", "not-a-number");

        let mut cfg = CerebrainConfig::default();
        cfg.apply_env_overrides();

        assert_eq!(cfg.llm.provider, "openai");
        // Unparseable numeric override is ignored
        assert_eq!(cfg.llm.max_tokens, 8192);

        std::env::remove_var("CEREBRAIN_PROVIDER");
        std::env::remove_var("CEREBRAIN_MAX_TOKENS");

        let cfg = CerebrainConfig::load_or_default("/nonexistent/cerebrain.toml");
        assert_eq!(cfg.llm.provider, "openrouter");
    }
}
