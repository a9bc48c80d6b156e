//! The turn orchestrator: one user message in, one reply out.
//!
//! ```text
//! Idle → PromptBuilt → AwaitingModel ⇄ SkillDispatch → Committed → Idle
//! ```
//!
//! The session lock is held for the whole turn, so turns on one session are
//! serialized. Skills run against the pre-turn state. Every mutation is
//! staged on a copy of that state and swapped in only when the long-term
//! write-through (the last step) succeeds. Dropping the future at any
//! `.await` leaves the session untouched.

use crate::api_types::{ContentBlock, Message, MessagesResponse, Role};
use crate::llm::{CompletionParams, LlmClient};
use crate::prompts::{PromptAssembler, PromptInputs};
use crate::skills::{SkillContext, SkillDelta, SkillOutput, SkillRegistry};
use crate::state::{BrainState, LiveState};
use crate::text_tool_parser::{parse_text_tool_calls, strip_tool_calls};
use cerebrain_core::config::{CerebrainConfig, EmotionConfig, MemoryConfig, OrchestratorConfig};
use cerebrain_core::thought::{
    STREAM_CONSCIOUSNESS, STREAM_EMOTIONAL, STREAM_INSPIRATION, STREAM_LOGICAL, STREAM_MEMORY,
};
use cerebrain_core::{
    BrainError, BrainIdentity, BrainResult, ProviderError, SessionSnapshot, Spark, TurnRecord,
    TurnRole, WorkspaceTexts,
};
use cerebrain_limbic::{ConsciousnessIntegrator, InspirationEngine, PulseState};
use cerebrain_memory::ShortTermMemory;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

pub const PROVIDER_FAILURE_REPLY: &str =
    "My reasoning core is unreachable right now. Try again in a moment.";
pub const DISPATCH_LIMIT_REPLY: &str =
    "I went around in circles checking myself. Ask me again and I will answer directly.";
pub const DEFAULT_GREETING: &str = "Ready.";
pub const EMPTY_REPLY: &str = "I have nothing to add.";

const LONG_REPLY_CHARS: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnPhase {
    Idle,
    PromptBuilt,
    AwaitingModel { round: usize },
    SkillDispatch { round: usize },
    Committed,
}

impl TurnPhase {
    fn can_advance_to(self, next: TurnPhase) -> bool {
        use TurnPhase::*;
        matches!(
            (self, next),
            (Idle, PromptBuilt)
                | (PromptBuilt, AwaitingModel { round: 0 })
                | (AwaitingModel { .. }, SkillDispatch { .. })
                | (AwaitingModel { .. }, Committed)
                | (SkillDispatch { .. }, AwaitingModel { .. })
                | (SkillDispatch { .. }, Committed)
                | (Committed, Idle)
        )
    }
}

/// Tracks the current phase and rejects illegal transitions in debug builds.
#[derive(Debug)]
struct TurnMachine {
    phase: TurnPhase,
}

impl TurnMachine {
    fn new() -> Self {
        Self {
            phase: TurnPhase::Idle,
        }
    }

    fn advance(&mut self, next: TurnPhase) {
        debug_assert!(
            self.phase.can_advance_to(next),
            "illegal turn transition {:?} -> {:?}",
            self.phase,
            next
        );
        tracing::debug!("Turn phase {:?} -> {:?}", self.phase, next);
        self.phase = next;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnStatus {
    /// Every delta applied.
    Committed,
    /// Dispatch limit hit: conversation turn and drift applied, skill
    /// deltas discarded.
    DispatchLimited,
    /// LLM failure: nothing applied.
    ProviderFailed,
    /// Staging or write-through failed: nothing applied.
    CommitFailed,
}

impl TurnStatus {
    pub fn state_changed(&self) -> bool {
        matches!(self, TurnStatus::Committed | TurnStatus::DispatchLimited)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkillCallRecord {
    pub round: usize,
    pub name: String,
    pub input: Value,
    pub content: String,
    pub is_error: bool,
}

/// What one turn produced. `reply` is always set.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnReport {
    pub reply: String,
    pub status: TurnStatus,
    /// Skill-dispatch rounds executed.
    pub rounds: usize,
    pub skill_calls: Vec<SkillCallRecord>,
    pub errors: Vec<BrainError>,
}

/// Transient aggregate for one exchange, discarded after commit or rollback.
struct TurnContext<'a> {
    user_text: &'a str,
    skill_calls: Vec<SkillCallRecord>,
    pending_sparks: Vec<Spark>,
    errors: Vec<BrainError>,
}

impl<'a> TurnContext<'a> {
    fn new(user_text: &'a str) -> Self {
        Self {
            user_text,
            skill_calls: Vec::new(),
            pending_sparks: Vec::new(),
            errors: Vec::new(),
        }
    }

    fn into_report(self, reply: String, status: TurnStatus, rounds: usize) -> TurnReport {
        TurnReport {
            reply,
            status,
            rounds,
            skill_calls: self.skill_calls,
            errors: self.errors,
        }
    }
}

enum ModelOutcome {
    Final(String),
    LimitExceeded,
}

#[derive(Debug, Clone)]
struct OrchestratorSettings {
    orchestrator: OrchestratorConfig,
    memory: MemoryConfig,
    emotion: EmotionConfig,
    creativity_nudge: f32,
}

pub struct TurnOrchestrator {
    identity: BrainIdentity,
    texts: WorkspaceTexts,
    client: Arc<dyn LlmClient>,
    skills: SkillRegistry,
    assembler: PromptAssembler,
    engine: InspirationEngine,
    integrator: ConsciousnessIntegrator,
    settings: OrchestratorSettings,
    state: Mutex<BrainState>,
}

impl TurnOrchestrator {
    pub fn new(
        identity: BrainIdentity,
        texts: WorkspaceTexts,
        client: Arc<dyn LlmClient>,
        engine: InspirationEngine,
        state: BrainState,
        config: &CerebrainConfig,
    ) -> Self {
        Self {
            identity,
            texts,
            client,
            skills: SkillRegistry::new(),
            assembler: PromptAssembler::new(&config.prompt),
            engine,
            integrator: ConsciousnessIntegrator::new(config.consciousness.clone()),
            settings: OrchestratorSettings {
                orchestrator: config.orchestrator.clone(),
                memory: config.memory.clone(),
                emotion: config.emotion.clone(),
                creativity_nudge: config.inspiration.creativity_nudge,
            },
            state: Mutex::new(state),
        }
    }

    pub fn identity(&self) -> &BrainIdentity {
        &self.identity
    }

    pub fn skills(&self) -> &SkillRegistry {
        &self.skills
    }

    pub fn tokens_used(&self) -> u64 {
        self.client.tokens_used()
    }

    pub async fn live_state(&self) -> LiveState {
        let state = self.state.lock().await;
        LiveState::capture(&state, &self.integrator).await
    }

    pub async fn pulse(&self) -> PulseState {
        self.state.lock().await.pulse(&self.integrator)
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let state = self.state.lock().await;
        SessionSnapshot::new(
            self.identity.clone(),
            state.emotional.clone(),
            state.memory.short_term().snapshot(),
            state.inspiration.clone(),
        )
        .with_thoughts(state.thoughts.clone())
    }

    /// Run one skill outside a turn. A spark from the side-effecting skill
    /// is committed right away under the session lock.
    pub async fn invoke_skill(&self, name: &str, args: &Value) -> BrainResult<SkillOutput> {
        let mut state = self.state.lock().await;
        let now = chrono::Utc::now().timestamp();
        let hint = state
            .memory
            .short_term()
            .iter()
            .rev()
            .find(|t| t.role == TurnRole::User)
            .map(|t| t.text.clone())
            .unwrap_or_default();
        let output = {
            let ctx = SkillContext::new(
                &state,
                &self.engine,
                &self.integrator,
                &hint,
                self.settings.memory.recall_k,
                now,
            );
            self.skills.invoke(name, args, &ctx).await?
        };
        if let Some(SkillDelta::Spark(spark)) = &output.delta {
            self.apply_spark(&mut state, spark.clone(), now);
        }
        Ok(output)
    }

    /// One-sentence greeting reflecting the live state. Reads only.
    pub async fn greet(&self) -> String {
        let state = self.state.lock().await;
        let live = LiveState::capture(&state, &self.integrator).await;
        let system = self.assembler.build(&PromptInputs {
            identity: &self.identity,
            user_context: &self.texts.user_context,
            tool_text: &self.texts.tool_text,
            memory_excerpt: &[],
            live_state: &live,
            skill_catalog: "",
        });
        drop(state);

        let messages = vec![Message::user_text(
            "Session start. Greet the user in one short sentence that reflects your current state.",
        )];
        match self.call_model(&system, messages, false).await {
            Ok(resp) => {
                let text = strip_tool_calls(&resp.joined_text());
                if text.is_empty() {
                    DEFAULT_GREETING.to_string()
                } else {
                    text
                }
            }
            Err(e) => {
                tracing::warn!("Greeting fell back to default: {}", e);
                DEFAULT_GREETING.to_string()
            }
        }
    }

    /// Drive one user turn to completion. Always returns a reply.
    #[tracing::instrument(skip(self, user_text), fields(brain = %self.identity.name))]
    pub async fn turn(&self, user_text: &str) -> TurnReport {
        let mut guard = self.state.lock().await;
        let mut machine = TurnMachine::new();
        let mut ctx = TurnContext::new(user_text);
        let now = chrono::Utc::now().timestamp();

        // Idle → PromptBuilt, from the pre-turn snapshot.
        let pre: &BrainState = &guard;
        let recalled = pre
            .memory
            .recall(user_text, self.settings.memory.recall_k)
            .await;
        let live = LiveState::capture(pre, &self.integrator).await;
        let catalog = self.skills.catalog_text();
        let system = self.assembler.build(&PromptInputs {
            identity: &self.identity,
            user_context: &self.texts.user_context,
            tool_text: &self.texts.tool_text,
            memory_excerpt: &recalled,
            live_state: &live,
            skill_catalog: &catalog,
        });
        machine.advance(TurnPhase::PromptBuilt);

        let mut messages = history_messages(pre.memory.short_term());
        messages.push(Message::user_text(user_text));

        let (outcome, rounds) = match self
            .run_model_loop(&system, messages, pre, &mut machine, &mut ctx, now)
            .await
        {
            Ok(v) => v,
            Err(e) => {
                tracing::error!("Turn aborted: {}", e);
                ctx.errors.push(BrainError::Provider(e));
                let rounds = match machine.phase {
                    TurnPhase::AwaitingModel { round } => round,
                    _ => 0,
                };
                return ctx.into_report(
                    PROVIDER_FAILURE_REPLY.to_string(),
                    TurnStatus::ProviderFailed,
                    rounds,
                );
            }
        };

        machine.advance(TurnPhase::Committed);
        let (reply, keep_skill_deltas) = match outcome {
            ModelOutcome::Final(text) => (text, true),
            ModelOutcome::LimitExceeded => (DISPATCH_LIMIT_REPLY.to_string(), false),
        };

        let mut next = pre.clone();
        self.stage_commit(&mut next, &mut ctx, &reply, keep_skill_deltas, now);
        let document = format!("user: {}\nassistant: {}", user_text, reply);
        let status = match next.memory.write_through(&document).await {
            Ok(_) => {
                *guard = next;
                if keep_skill_deltas {
                    TurnStatus::Committed
                } else {
                    TurnStatus::DispatchLimited
                }
            }
            Err(e) => {
                tracing::warn!("Commit failed, state left as before the turn: {}", e);
                ctx.errors.push(e);
                TurnStatus::CommitFailed
            }
        };
        machine.advance(TurnPhase::Idle);
        drop(guard);

        tracing::info!(
            "Turn done: status={:?} rounds={} skills={} errors={}",
            status,
            rounds,
            ctx.skill_calls.len(),
            ctx.errors.len()
        );
        ctx.into_report(reply, status, rounds)
    }

    async fn call_model(
        &self,
        system: &str,
        messages: Vec<Message>,
        with_tools: bool,
    ) -> Result<MessagesResponse, ProviderError> {
        let tools = if with_tools {
            self.skills.available_tools()
        } else {
            Vec::new()
        };
        let params = CompletionParams::from(&self.identity.llm);
        let limit = Duration::from_secs(self.settings.orchestrator.llm_timeout_secs.max(1));
        match tokio::time::timeout(limit, self.client.complete(system, messages, tools, params))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(ProviderError::transport(format!(
                "LLM call timed out after {}s",
                limit.as_secs()
            ))),
        }
    }

    /// AwaitingModel ⇄ SkillDispatch until the model stops asking for
    /// skills or a bound is hit.
    async fn run_model_loop(
        &self,
        system: &str,
        mut messages: Vec<Message>,
        pre: &BrainState,
        machine: &mut TurnMachine,
        ctx: &mut TurnContext<'_>,
        now: i64,
    ) -> Result<(ModelOutcome, usize), ProviderError> {
        let max_rounds = self.settings.orchestrator.max_skill_rounds;
        let mut round = 0usize;

        loop {
            machine.advance(TurnPhase::AwaitingModel { round });
            let response = self.call_model(system, messages.clone(), true).await?;
            let (text, calls) = interpret_response(&response, round);

            if calls.is_empty() {
                return Ok((ModelOutcome::Final(non_empty_or(text, EMPTY_REPLY)), round));
            }
            if round >= max_rounds {
                tracing::warn!("Skill dispatch limit reached after {} rounds", round);
                ctx.errors
                    .push(BrainError::SkillDispatchLimitExceeded { rounds: round });
                return Ok((ModelOutcome::LimitExceeded, round));
            }

            machine.advance(TurnPhase::SkillDispatch { round });
            let mut assistant_blocks = Vec::new();
            if !text.is_empty() {
                assistant_blocks.push(ContentBlock::Text { text: text.clone() });
            }
            let mut result_blocks = Vec::new();
            let skill_ctx = SkillContext::new(
                pre,
                &self.engine,
                &self.integrator,
                ctx.user_text,
                self.settings.memory.recall_k,
                now,
            );

            for (id, name, input) in &calls {
                tracing::info!("Skill call: {} {}", name, input);
                assistant_blocks.push(ContentBlock::ToolUse {
                    id: id.clone(),
                    name: name.clone(),
                    input: input.clone(),
                });
                let (content, is_error) = match self.skills.invoke(name, input, &skill_ctx).await {
                    Ok(output) => {
                        if let Some(SkillDelta::Spark(spark)) = output.delta {
                            ctx.pending_sparks.push(spark);
                        }
                        (output.content, false)
                    }
                    Err(e) => {
                        if e.is_skill_error() {
                            tracing::warn!("Skill '{}' rejected: {}", name, e);
                        } else {
                            tracing::error!("Skill '{}' failed: {}", name, e);
                        }
                        let content = format!("[skill error] {}", e);
                        ctx.errors.push(e);
                        (content, true)
                    }
                };
                ctx.skill_calls.push(SkillCallRecord {
                    round,
                    name: name.clone(),
                    input: input.clone(),
                    content: content.clone(),
                    is_error,
                });
                result_blocks.push(ContentBlock::ToolResult {
                    tool_use_id: id.clone(),
                    content,
                    is_error: if is_error { Some(true) } else { None },
                });
            }

            messages.push(Message {
                role: Role::Assistant,
                content: assistant_blocks,
            });
            messages.push(Message {
                role: Role::User,
                content: result_blocks,
            });
            round += 1;
        }
    }

    /// Apply the turn's deltas to a staged copy of the state.
    fn stage_commit(
        &self,
        next: &mut BrainState,
        ctx: &mut TurnContext<'_>,
        reply: &str,
        keep_skill_deltas: bool,
        now: i64,
    ) {
        next.thoughts.push(STREAM_CONSCIOUSNESS, "integrating...");
        next.thoughts.push(STREAM_LOGICAL, "reasoning...");
        next.memory.record(TurnRecord::new(TurnRole::User, ctx.user_text, now));
        next.memory.record(TurnRecord::new(TurnRole::Assistant, reply, now));

        let drift = self.settings.emotion.interaction_nudge;
        if ctx.user_text.contains('?') {
            self.nudge_quietly(next, "curious", drift);
        }
        if reply.chars().count() > LONG_REPLY_CHARS {
            self.nudge_quietly(next, "creative", drift);
        }

        if keep_skill_deltas {
            for spark in std::mem::take(&mut ctx.pending_sparks) {
                self.apply_spark(next, spark, now);
            }
        } else if !ctx.pending_sparks.is_empty() {
            tracing::debug!("Discarding {} staged sparks", ctx.pending_sparks.len());
            ctx.pending_sparks.clear();
        }
        self.engine.prune(&mut next.inspiration, now);
        next.emotional.advance_turn();
        self.record_thoughts(next, now);
    }

    /// Commit-time lines for each stream, newest at the end.
    fn record_thoughts(&self, next: &mut BrainState, now: i64) {
        let mood = next.emotional.current();
        if let Some((name, value)) = mood.dominant_trait() {
            next.thoughts.push(STREAM_EMOTIONAL, format!("{} ({:.2})", name, value));
        }
        let stm = next.memory.short_term();
        let line = format!("ST:{}/{}", stm.len(), stm.capacity());
        next.thoughts.push(STREAM_MEMORY, line);
        if let Some(spark) = next.inspiration.latest() {
            let ttl = self.engine.config().spark_ttl_secs;
            let line = format!("{} ({:.2})", spark.label, spark.strength_at(now, ttl));
            next.thoughts.push(STREAM_INSPIRATION, line);
        }
        next.thoughts.push(STREAM_CONSCIOUSNESS, "done");
    }

    fn apply_spark(&self, next: &mut BrainState, spark: Spark, now: i64) {
        let nudge = spark.strength * self.settings.creativity_nudge;
        tracing::info!("Spark committed: {} ({:.2})", spark.label, spark.strength);
        self.engine.accept(&mut next.inspiration, spark, now);
        self.nudge_quietly(next, "creative", nudge);
    }

    fn nudge_quietly(&self, next: &mut BrainState, name: &str, delta: f32) {
        if let Err(e) = next.emotional.nudge(name, delta) {
            tracing::debug!("Drift on '{}' skipped: {}", name, e);
        }
    }
}

/// Skill calls from native tool-use blocks plus any written inline as text.
/// Returns the user-visible text with call markup stripped.
fn interpret_response(
    response: &MessagesResponse,
    round: usize,
) -> (String, Vec<(String, String, Value)>) {
    let mut calls = Vec::new();
    for block in &response.content {
        if let ContentBlock::ToolUse { id, name, input } = block {
            calls.push((id.clone(), name.clone(), input.clone()));
        }
    }
    let raw = response.joined_text();
    for (i, parsed) in parse_text_tool_calls(&raw).into_iter().enumerate() {
        calls.push((format!("text_call_{}_{}", round, i), parsed.name, parsed.input));
    }
    (strip_tool_calls(&raw), calls)
}

fn non_empty_or(text: String, fallback: &str) -> String {
    if text.trim().is_empty() {
        fallback.to_string()
    } else {
        text
    }
}

/// Conversation history from short-term memory. The request must start
/// with a user message, so leading assistant turns are dropped.
fn history_messages(short_term: &ShortTermMemory) -> Vec<Message> {
    short_term
        .iter()
        .skip_while(|t| t.role == TurnRole::Assistant)
        .map(|t| match t.role {
            TurnRole::User => Message::user_text(t.text.clone()),
            TurnRole::Assistant => Message::assistant_text(t.text.clone()),
        })
        .collect()
}
