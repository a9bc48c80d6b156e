//! # Cerebrain Memory
//!
//! A bounded short-term buffer of recent turns plus optional long-term
//! similarity recall through a vector-store collaborator. When no
//! collaborator is configured every long-term operation is a no-op.

pub mod embedding;
pub mod long_term;
pub mod short_term;
mod store;

pub use embedding::{cosine_similarity, Embedder, Embedding, HashingEmbedder};
pub use long_term::{InMemoryVectorStore, LongTermMemory, RecalledMemory, VectorHit, VectorStore};
pub use short_term::ShortTermMemory;
pub use store::{MemorySummary, MemoryStore};

#[cfg(test)]
mod tests;
