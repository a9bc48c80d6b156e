//! Emotional self: a bounded mood vector with lazy decay toward baseline.
//!
//! Dimensions follow the PAD model:
//! - valence   (-1.0 to 1.0): unpleasant / pleasant
//! - arousal   ( 0.0 to 1.0): calm / activated
//! - dominance ( 0.0 to 1.0): yielding / in control
//!
//! Traits (curious, creative, ...) are named weights in 0.0 to 1.0.
//! Decay is applied on read from the number of turns elapsed since the
//! last write, so reading never mutates and two reads agree.

use crate::error::{BrainError, BrainResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Guard against NaN and Infinity in state values.
#[inline]
fn sanitize_f32(v: f32, fallback: f32) -> f32 {
    if v.is_finite() {
        v
    } else {
        tracing::warn!("NaN/Inf detected in mood value, resetting to fallback {}", fallback);
        fallback
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoodDimension {
    Valence,
    Arousal,
    Dominance,
}

impl MoodDimension {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "valence" => Some(Self::Valence),
            "arousal" => Some(Self::Arousal),
            "dominance" => Some(Self::Dominance),
            _ => None,
        }
    }

    pub fn bounds(self) -> (f32, f32) {
        match self {
            Self::Valence => (-1.0, 1.0),
            Self::Arousal | Self::Dominance => (0.0, 1.0),
        }
    }
}

pub const TRAIT_BOUNDS: (f32, f32) = (0.0, 1.0);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionalState {
    pub valence: f32,
    pub arousal: f32,
    pub dominance: f32,
    /// BTreeMap keeps prompt rendering order stable.
    pub traits: BTreeMap<String, f32>,
}

impl Default for EmotionalState {
    fn default() -> Self {
        let traits = [
            ("curious", 0.7),
            ("creative", 0.6),
            ("focused", 0.5),
            ("empathetic", 0.6),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
        Self {
            valence: 0.1,
            arousal: 0.4,
            dominance: 0.5,
            traits,
        }
    }
}

impl EmotionalState {
    pub fn with_traits(traits: BTreeMap<String, f32>) -> Self {
        let mut state = Self {
            traits,
            ..Self::default()
        };
        state.normalize();
        state
    }

    pub fn get(&self, name: &str) -> Option<f32> {
        match MoodDimension::parse(name) {
            Some(MoodDimension::Valence) => Some(self.valence),
            Some(MoodDimension::Arousal) => Some(self.arousal),
            Some(MoodDimension::Dominance) => Some(self.dominance),
            None => self.traits.get(name).copied(),
        }
    }

    /// Overall emotional intensity in 0.0 to 1.0.
    pub fn magnitude(&self) -> f32 {
        let v = self.valence.abs();
        let a = self.arousal;
        let d = (self.dominance * 2.0 - 1.0).abs();
        ((v * v + a * a + d * d) / 3.0).sqrt().clamp(0.0, 1.0)
    }

    /// Strongest trait, ties broken by name order.
    pub fn dominant_trait(&self) -> Option<(&str, f32)> {
        self.traits
            .iter()
            .fold(None, |best: Option<(&str, f32)>, (k, v)| match best {
                Some((_, bv)) if bv >= *v => best,
                _ => Some((k.as_str(), *v)),
            })
    }

    /// Compact line for prompts and skill results, e.g.
    /// `valence:0.10 arousal:0.40 dominance:0.50 | creative:0.60, curious:0.70`.
    pub fn summary(&self) -> String {
        let traits = self
            .traits
            .iter()
            .map(|(k, v)| format!("{}:{:.2}", k, v))
            .collect::<Vec<_>>()
            .join(", ");
        let traits = if traits.is_empty() { "none".to_string() } else { traits };
        format!(
            "valence:{:.2} arousal:{:.2} dominance:{:.2} | {}",
            self.valence, self.arousal, self.dominance, traits
        )
    }

    /// Clamp all values to valid ranges.
    pub fn normalize(&mut self) {
        let (lo, hi) = MoodDimension::Valence.bounds();
        self.valence = sanitize_f32(self.valence, 0.0).clamp(lo, hi);
        let (lo, hi) = MoodDimension::Arousal.bounds();
        self.arousal = sanitize_f32(self.arousal, 0.4).clamp(lo, hi);
        let (lo, hi) = MoodDimension::Dominance.bounds();
        self.dominance = sanitize_f32(self.dominance, 0.5).clamp(lo, hi);
        for v in self.traits.values_mut() {
            *v = sanitize_f32(*v, 0.5).clamp(TRAIT_BOUNDS.0, TRAIT_BOUNDS.1);
        }
    }

    /// Move every value toward `baseline` by `1 - (1 - rate)^turns` of the distance.
    fn decayed_toward(&self, baseline: &EmotionalState, rate: f32, turns: u64) -> EmotionalState {
        if turns == 0 || rate <= 0.0 {
            return self.clone();
        }
        let keep = (1.0 - rate.clamp(0.0, 1.0)).powi(turns.min(i32::MAX as u64) as i32);
        let mix = |cur: f32, base: f32| base + (cur - base) * keep;
        let mut out = EmotionalState {
            valence: mix(self.valence, baseline.valence),
            arousal: mix(self.arousal, baseline.arousal),
            dominance: mix(self.dominance, baseline.dominance),
            traits: self
                .traits
                .iter()
                .map(|(k, v)| {
                    let base = baseline.traits.get(k).copied().unwrap_or(*v);
                    (k.clone(), mix(*v, base))
                })
                .collect(),
        };
        out.normalize();
        out
    }
}

/// The emotional subsystem. Holds the last written mood, the baseline it
/// decays toward and a turn counter advanced by the orchestrator on commit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionalSelf {
    baseline: EmotionalState,
    raw: EmotionalState,
    /// Committed turns so far.
    turn: u64,
    /// Turn at which `raw` was last written.
    as_of_turn: u64,
    decay_rate: f32,
}

impl Default for EmotionalSelf {
    fn default() -> Self {
        Self::new(EmotionalState::default(), 0.1)
    }
}

impl EmotionalSelf {
    pub fn new(baseline: EmotionalState, decay_rate: f32) -> Self {
        let mut baseline = baseline;
        baseline.normalize();
        Self {
            raw: baseline.clone(),
            baseline,
            turn: 0,
            as_of_turn: 0,
            decay_rate: sanitize_f32(decay_rate, 0.1).clamp(0.0, 1.0),
        }
    }

    /// Current mood, decayed toward baseline by the turns elapsed since the last write.
    pub fn current(&self) -> EmotionalState {
        let elapsed = self.turn.saturating_sub(self.as_of_turn);
        self.raw
            .decayed_toward(&self.baseline, self.decay_rate, elapsed)
    }

    pub fn baseline(&self) -> &EmotionalState {
        &self.baseline
    }

    pub fn turn(&self) -> u64 {
        self.turn
    }

    /// Record one committed turn. Decay shows up on the next read.
    pub fn advance_turn(&mut self) {
        self.turn += 1;
    }

    /// Add `delta` to a dimension or trait, clamp into its range and
    /// return the post-nudge value. Unknown names are rejected.
    pub fn nudge(&mut self, name: &str, delta: f32) -> BrainResult<f32> {
        let bounds = if let Some(dim) = MoodDimension::parse(name) {
            dim.bounds()
        } else if self.raw.traits.contains_key(name) {
            TRAIT_BOUNDS
        } else {
            return Err(BrainError::invalid_argument(
                "nudge",
                format!("unknown mood dimension or trait '{}'", name),
            ));
        };

        // Materialise lazy decay before writing.
        self.raw = self.current();
        self.as_of_turn = self.turn;

        // NaN carries no direction; infinities saturate at the bound below.
        let delta = if delta.is_nan() { 0.0 } else { delta };
        let slot = match MoodDimension::parse(name) {
            Some(MoodDimension::Valence) => &mut self.raw.valence,
            Some(MoodDimension::Arousal) => &mut self.raw.arousal,
            Some(MoodDimension::Dominance) => &mut self.raw.dominance,
            None => match self.raw.traits.get_mut(name) {
                Some(v) => v,
                None => {
                    return Err(BrainError::invalid_argument(
                        "nudge",
                        format!("unknown trait '{}'", name),
                    ))
                }
            },
        };
        // Saturating add: an overflowing delta lands on the bound, not on inf.
        let next = (*slot + delta).clamp(bounds.0, bounds.1);
        *slot = sanitize_f32(next, bounds.0);
        Ok(*slot)
    }
}
