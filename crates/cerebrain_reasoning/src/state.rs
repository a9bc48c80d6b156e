use cerebrain_core::{
    EmotionalSelf, EmotionalState, InspirationState, SessionSnapshot, ThoughtStreams,
};
use cerebrain_limbic::{ConsciousnessIntegrator, PulseInputs, PulseState};
use cerebrain_memory::{MemoryStore, MemorySummary, ShortTermMemory};
use serde::Serialize;

/// Everything one brain session mutates. Only the orchestrator writes it,
/// and only by swapping in a fully staged copy at commit.
#[derive(Clone)]
pub struct BrainState {
    pub emotional: EmotionalSelf,
    pub memory: MemoryStore,
    pub inspiration: InspirationState,
    pub thoughts: ThoughtStreams,
}

impl BrainState {
    pub fn new(emotional: EmotionalSelf, memory: MemoryStore) -> Self {
        Self {
            emotional,
            memory,
            inspiration: InspirationState::default(),
            thoughts: ThoughtStreams::default(),
        }
    }

    /// Rebuild from a snapshot. Long-term memory is attached separately.
    pub fn from_snapshot(snapshot: &SessionSnapshot) -> Self {
        Self {
            emotional: snapshot.emotional.clone(),
            memory: MemoryStore::with_short_term(ShortTermMemory::from_snapshot(
                snapshot.short_term.clone(),
            )),
            inspiration: snapshot.inspiration.clone(),
            thoughts: snapshot.thoughts.clone(),
        }
    }

    pub fn pulse_inputs<'a>(&'a self, mood: &'a EmotionalState) -> PulseInputs<'a> {
        let stm = self.memory.short_term();
        PulseInputs {
            mood,
            short_term_len: stm.len(),
            short_term_capacity: stm.capacity(),
            recent_user_turns: stm.user_turns(),
            active_sparks: self.inspiration.active_count(),
        }
    }

    pub fn pulse(&self, integrator: &ConsciousnessIntegrator) -> PulseState {
        let mood = self.emotional.current();
        integrator.pulse(&self.pulse_inputs(&mood))
    }
}

/// Live state as of the start of a turn, rendered into the prompt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LiveState {
    pub mood: EmotionalState,
    pub memory: MemorySummary,
    pub active_sparks: usize,
    pub pulse: PulseState,
}

impl LiveState {
    pub async fn capture(state: &BrainState, integrator: &ConsciousnessIntegrator) -> Self {
        let mood = state.emotional.current();
        let pulse = integrator.pulse(&state.pulse_inputs(&mood));
        Self {
            memory: state.memory.summary().await,
            active_sparks: state.inspiration.active_count(),
            mood,
            pulse,
        }
    }

    pub fn render(&self) -> String {
        format!(
            "# Current state (live)\nMood: {}\nMemory: short_term={}/{} long_term={}\nInspiration: {} active\n{}",
            self.mood.summary(),
            self.memory.short_term,
            self.memory.short_term_capacity,
            self.memory.long_term,
            self.active_sparks,
            self.pulse.summary(),
        )
    }
}
