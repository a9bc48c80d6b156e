use crate::long_term::{LongTermMemory, RecalledMemory};
use crate::short_term::ShortTermMemory;
use cerebrain_core::{BrainResult, TurnRecord};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MemorySummary {
    pub short_term: usize,
    pub short_term_capacity: usize,
    pub long_term: usize,
    pub long_term_enabled: bool,
}

/// Short-term buffer plus the optional long-term collaborator.
///
/// Cloning is cheap on the long-term side (shared handle) and deep on the
/// short-term side, which is what lets the orchestrator stage a commit on a
/// copy and swap it in only when every step succeeded.
#[derive(Clone)]
pub struct MemoryStore {
    short_term: ShortTermMemory,
    long_term: Option<LongTermMemory>,
}

impl MemoryStore {
    pub fn new(short_term_capacity: usize) -> Self {
        Self {
            short_term: ShortTermMemory::new(short_term_capacity),
            long_term: None,
        }
    }

    pub fn with_short_term(short_term: ShortTermMemory) -> Self {
        Self {
            short_term,
            long_term: None,
        }
    }

    pub fn with_long_term(mut self, long_term: LongTermMemory) -> Self {
        self.long_term = Some(long_term);
        self
    }

    pub fn short_term(&self) -> &ShortTermMemory {
        &self.short_term
    }

    pub fn has_long_term(&self) -> bool {
        self.long_term.is_some()
    }

    /// Append to the short-term buffer, evicting the oldest turn when full.
    pub fn record(&mut self, turn: TurnRecord) -> Option<TurnRecord> {
        self.short_term.record(turn)
    }

    /// Top-k similar documents, best first. Never fails: a missing
    /// collaborator or a failing one both give an empty list.
    pub async fn recall(&self, query: &str, k: usize) -> Vec<RecalledMemory> {
        let Some(ltm) = &self.long_term else {
            return Vec::new();
        };
        if query.trim().is_empty() {
            return Vec::new();
        }
        match ltm.query(query, k).await {
            Ok(hits) => hits,
            Err(e) => {
                tracing::warn!("Recall degraded to empty: {}", e);
                Vec::new()
            }
        }
    }

    /// Counts only; no recall is issued.
    pub async fn summary(&self) -> MemorySummary {
        let long_term = match &self.long_term {
            Some(ltm) => ltm.count().await.unwrap_or_else(|e| {
                tracing::warn!("Long-term count unavailable: {}", e);
                0
            }),
            None => 0,
        };
        MemorySummary {
            short_term: self.short_term.len(),
            short_term_capacity: self.short_term.capacity(),
            long_term,
            long_term_enabled: self.has_long_term(),
        }
    }

    /// Insert one document into long-term memory under a fresh id.
    /// A no-op `Ok` when no collaborator is configured.
    pub async fn write_through(&self, text: &str) -> BrainResult<Option<String>> {
        let Some(ltm) = &self.long_term else {
            return Ok(None);
        };
        let id = uuid::Uuid::new_v4().to_string();
        ltm.insert(&id, text).await?;
        tracing::debug!("Long-term write-through {}", id);
        Ok(Some(id))
    }
}
