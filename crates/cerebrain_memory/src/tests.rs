use crate::{
    HashingEmbedder, InMemoryVectorStore, LongTermMemory, MemoryStore, VectorHit, VectorStore,
};
use async_trait::async_trait;
use cerebrain_core::{BrainError, TurnRecord};
use std::sync::Arc;

struct BrokenStore;

#[async_trait]
impl VectorStore for BrokenStore {
    async fn upsert(&self, _id: &str, _text: &str, _embedding: &[f32]) -> anyhow::Result<()> {
        anyhow::bail!("index offline")
    }
    async fn query(&self, _embedding: &[f32], _k: usize) -> anyhow::Result<Vec<VectorHit>> {
        anyhow::bail!("index offline")
    }
    async fn count(&self) -> anyhow::Result<usize> {
        anyhow::bail!("index offline")
    }
}

fn with_in_memory(capacity: usize) -> MemoryStore {
    MemoryStore::new(capacity).with_long_term(LongTermMemory::new(
        Arc::new(InMemoryVectorStore::new()),
        Arc::new(HashingEmbedder::default()),
    ))
}

#[tokio::test]
async fn test_recall_without_long_term_is_empty() {
    let mut store = MemoryStore::new(3);
    store.record(TurnRecord::user("hello"));
    assert!(store.recall("hello", 5).await.is_empty());
    assert_eq!(store.write_through("hello").await.unwrap(), None);

    let summary = store.summary().await;
    assert_eq!(summary.short_term, 1);
    assert_eq!(summary.long_term, 0);
    assert!(!summary.long_term_enabled);
}

#[tokio::test]
async fn test_failing_collaborator_degrades_recall() {
    let store = MemoryStore::new(3).with_long_term(LongTermMemory::new(
        Arc::new(BrokenStore),
        Arc::new(HashingEmbedder::default()),
    ));
    assert!(store.recall("anything", 3).await.is_empty());
    assert_eq!(store.summary().await.long_term, 0);
    // Write-through reports the failure so the orchestrator can roll back.
    let err = store.write_through("turn").await.unwrap_err();
    assert!(matches!(err, BrainError::RecallUnavailable(_)));
}

#[tokio::test]
async fn test_write_through_then_recall() {
    let store = with_in_memory(3);
    store.write_through("user: I keep bees\nassistant: Noted.").await.unwrap();
    store.write_through("user: the bus was late").await.unwrap();
    let hits = store.recall("bees", 1).await;
    assert_eq!(hits.len(), 1);
    assert!(hits[0].text.contains("bees"));
    assert_eq!(store.summary().await.long_term, 2);
}

#[tokio::test]
async fn test_clone_shares_long_term_but_not_short_term() {
    let mut a = with_in_memory(2);
    let b = a.clone();
    a.record(TurnRecord::user("only in a"));
    a.write_through("shared doc").await.unwrap();
    assert_eq!(b.short_term().len(), 0);
    assert_eq!(b.summary().await.long_term, 1);
}
