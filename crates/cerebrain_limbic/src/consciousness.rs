//! Consciousness integration: a pulse scalar and per-stream activity levels,
//! recomputed from snapshots of mood, memory occupancy and active sparks.
//! Nothing here is cached.

use cerebrain_core::config::ConsciousnessConfig;
use cerebrain_core::EmotionalState;
use serde::Serialize;
use std::collections::BTreeMap;

pub use cerebrain_core::thought::{
    STREAM_CONSCIOUSNESS, STREAM_EMOTIONAL, STREAM_INSPIRATION, STREAM_LOGICAL, STREAM_MEMORY,
};

/// Snapshot of everything the pulse depends on.
#[derive(Debug, Clone, Copy)]
pub struct PulseInputs<'a> {
    pub mood: &'a EmotionalState,
    pub short_term_len: usize,
    pub short_term_capacity: usize,
    /// User turns currently held in short-term memory.
    pub recent_user_turns: usize,
    pub active_sparks: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PulseState {
    pub pulse: f32,
    pub streams: BTreeMap<String, f32>,
}

impl PulseState {
    /// e.g. `pulse:0.42 | consciousness:0.42, emotional:0.38, ...`
    pub fn summary(&self) -> String {
        let streams = self
            .streams
            .iter()
            .map(|(k, v)| format!("{}:{:.2}", k, v))
            .collect::<Vec<_>>()
            .join(", ");
        format!("pulse:{:.2} | {}", self.pulse, streams)
    }
}

fn ratio(n: usize, d: usize) -> f32 {
    if d == 0 {
        0.0
    } else {
        (n as f32 / d as f32).clamp(0.0, 1.0)
    }
}

fn finite_or_zero(v: f32) -> f32 {
    if v.is_finite() {
        v.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConsciousnessIntegrator {
    config: ConsciousnessConfig,
}

impl ConsciousnessIntegrator {
    pub fn new(config: ConsciousnessConfig) -> Self {
        Self { config }
    }

    /// Weighted mean of arousal, memory fill and spark activity. Weights are
    /// normalised so their sum does not need to be exactly 1.
    pub fn pulse(&self, inputs: &PulseInputs<'_>) -> PulseState {
        let arousal = finite_or_zero(inputs.mood.arousal);
        let fill = ratio(inputs.short_term_len, inputs.short_term_capacity);
        let inspiration = ratio(inputs.active_sparks, self.config.spark_saturation);
        let logical = ratio(inputs.recent_user_turns, self.config.logical_saturation);

        let weights = [
            self.config.arousal_weight,
            self.config.memory_weight,
            self.config.inspiration_weight,
        ]
        .map(|w| if w.is_finite() { w.max(0.0) } else { 0.0 });
        let total: f32 = weights.iter().sum();
        let pulse = if total > 0.0 {
            ((weights[0] * arousal + weights[1] * fill + weights[2] * inspiration) / total)
                .clamp(0.0, 1.0)
        } else {
            0.0
        };

        let mut streams = BTreeMap::new();
        streams.insert(
            STREAM_EMOTIONAL.to_string(),
            finite_or_zero(inputs.mood.magnitude()),
        );
        streams.insert(STREAM_LOGICAL.to_string(), logical);
        streams.insert(STREAM_MEMORY.to_string(), fill);
        streams.insert(STREAM_INSPIRATION.to_string(), inspiration);
        streams.insert(STREAM_CONSCIOUSNESS.to_string(), pulse);

        PulseState { pulse, streams }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs(mood: &EmotionalState) -> PulseInputs<'_> {
        PulseInputs {
            mood,
            short_term_len: 7,
            short_term_capacity: 7,
            recent_user_turns: 2,
            active_sparks: 3,
        }
    }

    #[test]
    fn test_pulse_weighted_combination() {
        let mood = EmotionalState::default(); // arousal 0.4
        let state = ConsciousnessIntegrator::default().pulse(&inputs(&mood));
        // 0.4*0.4 + 0.3*1.0 + 0.3*1.0
        assert!((state.pulse - 0.76).abs() < 1e-5);
        assert_eq!(state.streams[STREAM_MEMORY], 1.0);
        assert_eq!(state.streams[STREAM_INSPIRATION], 1.0);
        assert_eq!(state.streams[STREAM_LOGICAL], 0.5);
        assert_eq!(state.streams[STREAM_CONSCIOUSNESS], state.pulse);
    }

    #[test]
    fn test_weights_are_normalised() {
        let mood = EmotionalState::default();
        let doubled = ConsciousnessIntegrator::new(ConsciousnessConfig {
            arousal_weight: 0.8,
            memory_weight: 0.6,
            inspiration_weight: 0.6,
            ..ConsciousnessConfig::default()
        });
        let a = doubled.pulse(&inputs(&mood)).pulse;
        let b = ConsciousnessIntegrator::default().pulse(&inputs(&mood)).pulse;
        assert!((a - b).abs() < 1e-6);
    }

    #[test]
    fn test_empty_state_and_zero_capacity() {
        let mut mood = EmotionalState::default();
        mood.arousal = 0.0;
        let state = ConsciousnessIntegrator::default().pulse(&PulseInputs {
            mood: &mood,
            short_term_len: 0,
            short_term_capacity: 0,
            recent_user_turns: 0,
            active_sparks: 0,
        });
        assert_eq!(state.pulse, 0.0);
        assert_eq!(state.streams[STREAM_MEMORY], 0.0);
    }

    #[test]
    fn test_zero_weights_yield_zero_pulse() {
        let mood = EmotionalState::default();
        let integrator = ConsciousnessIntegrator::new(ConsciousnessConfig {
            arousal_weight: 0.0,
            memory_weight: 0.0,
            inspiration_weight: 0.0,
            ..ConsciousnessConfig::default()
        });
        assert_eq!(integrator.pulse(&inputs(&mood)).pulse, 0.0);
    }

    #[test]
    fn test_summary_lists_streams_in_name_order() {
        let mood = EmotionalState::default();
        let line = ConsciousnessIntegrator::default().pulse(&inputs(&mood)).summary();
        assert!(line.starts_with("pulse:0.76 | consciousness:0.76, emotional:"));
    }
}
