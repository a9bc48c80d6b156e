//! Long-term memory: a vector-store collaborator behind a narrow trait.
//!
//! The core only ever inserts documents and asks for the k nearest ones.
//! [`InMemoryVectorStore`] is the in-process implementation used by the CLI
//! and tests; anything else (a hosted index, sqlite-vec) plugs in through
//! [`VectorStore`].

use crate::embedding::{cosine_similarity, Embedder, Embedding};
use anyhow::Result;
use async_trait::async_trait;
use cerebrain_core::{BrainError, BrainResult};
use serde::Serialize;
use std::cmp::Ordering;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone, PartialEq)]
pub struct VectorHit {
    pub id: String,
    pub text: String,
    pub score: f32,
    /// Monotonic insertion sequence assigned by the store.
    pub inserted_seq: u64,
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn upsert(&self, id: &str, text: &str, embedding: &[f32]) -> Result<()>;
    async fn query(&self, embedding: &[f32], k: usize) -> Result<Vec<VectorHit>>;
    async fn count(&self) -> Result<usize>;
}

/// One recalled document as the rest of the brain sees it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecalledMemory {
    pub text: String,
    pub score: f32,
}

/// Highest score first; equal scores put the newer insertion first.
pub fn rank_hits(hits: &mut [VectorHit]) {
    hits.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| b.inserted_seq.cmp(&a.inserted_seq))
    });
}

#[derive(Clone)]
pub struct LongTermMemory {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
}

impl LongTermMemory {
    pub fn new(store: Arc<dyn VectorStore>, embedder: Arc<dyn Embedder>) -> Self {
        Self { store, embedder }
    }

    pub async fn insert(&self, id: &str, text: &str) -> BrainResult<()> {
        let embedding = self
            .embedder
            .embed(text)
            .map_err(|e| BrainError::RecallUnavailable(format!("embed: {}", e)))?;
        self.store
            .upsert(id, text, &embedding)
            .await
            .map_err(|e| BrainError::RecallUnavailable(format!("upsert: {}", e)))
    }

    pub async fn query(&self, text: &str, k: usize) -> BrainResult<Vec<RecalledMemory>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let embedding = self
            .embedder
            .embed(text)
            .map_err(|e| BrainError::RecallUnavailable(format!("embed: {}", e)))?;
        let mut hits = self
            .store
            .query(&embedding, k)
            .await
            .map_err(|e| BrainError::RecallUnavailable(format!("query: {}", e)))?;
        hits.retain(|h| h.score.is_finite());
        rank_hits(&mut hits);
        hits.truncate(k);
        Ok(hits
            .into_iter()
            .map(|h| RecalledMemory {
                text: h.text,
                score: h.score,
            })
            .collect())
    }

    pub async fn count(&self) -> BrainResult<usize> {
        self.store
            .count()
            .await
            .map_err(|e| BrainError::RecallUnavailable(format!("count: {}", e)))
    }
}

// ============================================================================
// In-process store
// ============================================================================

struct Entry {
    id: String,
    text: String,
    embedding: Embedding,
    seq: u64,
}

/// Brute-force cosine search over a `Vec`. Upserting an existing id replaces
/// it and gives it a fresh sequence number.
#[derive(Default)]
pub struct InMemoryVectorStore {
    entries: RwLock<Vec<Entry>>,
    next_seq: AtomicU64,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn upsert(&self, id: &str, text: &str, embedding: &[f32]) -> Result<()> {
        let seq = self.next_seq.fetch_add(1, AtomicOrdering::SeqCst);
        let mut entries = self.entries.write().await;
        entries.retain(|e| e.id != id);
        entries.push(Entry {
            id: id.to_string(),
            text: text.to_string(),
            embedding: embedding.to_vec(),
            seq,
        });
        Ok(())
    }

    async fn query(&self, embedding: &[f32], k: usize) -> Result<Vec<VectorHit>> {
        let entries = self.entries.read().await;
        let mut hits: Vec<VectorHit> = entries
            .iter()
            .map(|e| VectorHit {
                id: e.id.clone(),
                text: e.text.clone(),
                score: cosine_similarity(embedding, &e.embedding),
                inserted_seq: e.seq,
            })
            .collect();
        rank_hits(&mut hits);
        hits.truncate(k);
        Ok(hits)
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.entries.read().await.len())
    }
}
