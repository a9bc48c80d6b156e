//! Error taxonomy for the brain matrix.
//!
//! Every variant has a defined degraded outcome; nothing here is meant to
//! abort the owning process. The orchestrator translates each of these into
//! either a skill-error result (fed back to the model) or a short reply.

use thiserror::Error;

/// Transport or protocol failure reported by an LLM provider.
///
/// `status` is the HTTP status when one was received; `None` means the
/// request never produced a response (timeout, DNS, connection refused) or
/// the body could not be decoded.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("provider error{}: {message}", .status.map(|s| format!(" ({s})")).unwrap_or_default())]
pub struct ProviderError {
    pub status: Option<u16>,
    pub message: String,
}

impl ProviderError {
    pub fn new(status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(None, message)
    }

    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self::new(Some(status), message)
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BrainError {
    /// Fatal to the turn, surfaced as a single degraded reply.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Every randomness source failed. Recovered locally, never surfaced.
    #[error("all randomness sources unavailable")]
    RandomnessUnavailable,

    /// Vector store absent or failing. Recovered as an empty result set.
    #[error("long-term recall unavailable: {0}")]
    RecallUnavailable(String),

    #[error("unknown skill '{name}' (known: {})", .known.join(", "))]
    UnknownSkill { name: String, known: Vec<String> },

    #[error("invalid argument for skill '{skill}': {reason}")]
    InvalidSkillArgument { skill: String, reason: String },

    #[error("skill dispatch limit of {rounds} rounds exceeded")]
    SkillDispatchLimitExceeded { rounds: usize },

    #[error("session persistence failed: {0}")]
    Persistence(String),
}

impl BrainError {
    pub fn invalid_argument(skill: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidSkillArgument {
            skill: skill.into(),
            reason: reason.into(),
        }
    }

    /// Errors that are reported back into the model's context as a
    /// skill-error result instead of ending the turn.
    pub fn is_skill_error(&self) -> bool {
        matches!(
            self,
            BrainError::UnknownSkill { .. } | BrainError::InvalidSkillArgument { .. }
        )
    }
}

pub type BrainResult<T> = Result<T, BrainError>;
