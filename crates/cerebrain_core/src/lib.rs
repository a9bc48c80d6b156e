//! # Cerebrain Core
//!
//! Shared vocabulary of the brain matrix: identity, the emotional self,
//! spark and turn records, thought streams, configuration, the error taxonomy and session
//! persistence. Engines that act on these types live in the sibling crates.

pub mod affect;
pub mod config;
pub mod error;
pub mod identity;
pub mod persistence;
pub mod spark;
pub mod thought;
pub mod turn;

pub use affect::{EmotionalSelf, EmotionalState, MoodDimension};
pub use config::CerebrainConfig;
pub use error::{BrainError, BrainResult, ProviderError};
pub use identity::{BrainIdentity, LlmDefaults, WorkspaceTexts};
pub use persistence::{JsonFileStore, SessionSnapshot, SessionStore, ShortTermSnapshot};
pub use spark::{InspirationState, Spark};
pub use thought::ThoughtStreams;
pub use turn::{TurnRecord, TurnRole};
