//! # Cerebrain Limbic
//!
//! The non-verbal half of the brain matrix:
//!
//! - **Randomness**: natural entropy from remote providers with a local
//!   fallback, used to gate inspiration
//! - **Inspiration**: transient sparks with strength and expiry
//! - **Consciousness**: a derived pulse plus per-stream activity levels
//!
//! None of these types own session state. The orchestrator passes in the
//! snapshots they read and applies whatever they return at commit time.

pub mod consciousness;
pub mod inspiration;
pub mod randomness;

pub use consciousness::{ConsciousnessIntegrator, PulseInputs, PulseState};
pub use inspiration::InspirationEngine;
pub use randomness::{
    AnuQuantumProvider, ProcessEntropy, RandomOrgProvider, RandomnessChain, RandomnessProvider,
    RandomnessSource, ThreadRngProvider,
};
