//! Session persistence. Long-term memory is not included; it lives
//! with the vector-store collaborator.

use crate::affect::EmotionalSelf;
use crate::error::{BrainError, BrainResult};
use crate::identity::BrainIdentity;
use crate::spark::InspirationState;
use crate::thought::ThoughtStreams;
use crate::turn::TurnRecord;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const SNAPSHOT_VERSION: u32 = 1;

fn default_version() -> u32 {
    SNAPSHOT_VERSION
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShortTermSnapshot {
    pub capacity: usize,
    /// Oldest first.
    pub turns: Vec<TurnRecord>,
}

/// Full brain session state as of the last committed turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    #[serde(default = "default_version")]
    pub version: u32,
    pub identity: BrainIdentity,
    pub emotional: EmotionalSelf,
    pub short_term: ShortTermSnapshot,
    #[serde(default)]
    pub inspiration: InspirationState,
    #[serde(default)]
    pub thoughts: ThoughtStreams,
    pub saved_at: i64,
}

impl SessionSnapshot {
    pub fn new(
        identity: BrainIdentity,
        emotional: EmotionalSelf,
        short_term: ShortTermSnapshot,
        inspiration: InspirationState,
    ) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            identity,
            emotional,
            short_term,
            inspiration,
            thoughts: ThoughtStreams::default(),
            saved_at: chrono::Utc::now().timestamp(),
        }
    }

    pub fn with_thoughts(mut self, thoughts: ThoughtStreams) -> Self {
        self.thoughts = thoughts;
        self
    }
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// `Ok(None)` when nothing has been saved yet.
    async fn load(&self) -> BrainResult<Option<SessionSnapshot>>;
    async fn save(&self, snapshot: &SessionSnapshot) -> BrainResult<()>;
}

/// Pretty-printed JSON file, written through a sibling temp file and renamed
/// into place so a crash never leaves a half-written snapshot.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SessionStore for JsonFileStore {
    async fn load(&self) -> BrainResult<Option<SessionSnapshot>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(BrainError::Persistence(format!(
                    "read {}: {}",
                    self.path.display(),
                    e
                )))
            }
        };
        let snapshot = serde_json::from_str(&content).map_err(|e| {
            BrainError::Persistence(format!("decode {}: {}", self.path.display(), e))
        })?;
        Ok(Some(snapshot))
    }

    async fn save(&self, snapshot: &SessionSnapshot) -> BrainResult<()> {
        let json = serde_json::to_string_pretty(snapshot)
            .map_err(|e| BrainError::Persistence(format!("encode: {}", e)))?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| BrainError::Persistence(format!("mkdir: {}", e)))?;
            }
        }
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|e| BrainError::Persistence(format!("write {}: {}", tmp.display(), e)))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| BrainError::Persistence(format!("rename: {}", e)))?;
        tracing::debug!("Session saved to {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::LlmDefaults;
    use crate::spark::Spark;
    use crate::turn::TurnRole;

    fn sample_snapshot() -> SessionSnapshot {
        let mut emotional = EmotionalSelf::default();
        emotional.nudge("curious", 0.2).unwrap();
        emotional.advance_turn();
        let mut inspiration = InspirationState::default();
        inspiration.push(Spark::new("noise → filter → signal", 0.42, 1_700_000_000), 5);
        let mut thoughts = ThoughtStreams::default();
        thoughts.push(crate::thought::STREAM_MEMORY, "ST:2");
        SessionSnapshot::new(
            BrainIdentity::new("Cerebra", "Terse.", LlmDefaults::default()),
            emotional,
            ShortTermSnapshot {
                capacity: 7,
                turns: vec![
                    TurnRecord::new(TurnRole::User, "hi", 1),
                    TurnRecord::new(TurnRole::Assistant, "Online.", 2),
                ],
            },
            inspiration,
        )
        .with_thoughts(thoughts)
    }

    #[tokio::test]
    async fn test_json_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("states/cerebra.json"));
        let snapshot = sample_snapshot();
        store.save(&snapshot).await.unwrap();
        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded, snapshot);
        assert_eq!(loaded.emotional.current(), snapshot.emotional.current());
        assert_eq!(loaded.thoughts.recent("memory", 5), vec!["ST:2"]);
    }

    #[test]
    fn test_snapshot_without_thoughts_loads_empty_streams() {
        let mut value = serde_json::to_value(sample_snapshot()).unwrap();
        value.as_object_mut().unwrap().remove("thoughts");
        let loaded: SessionSnapshot = serde_json::from_value(value).unwrap();
        assert_eq!(loaded.thoughts, ThoughtStreams::default());
    }

    #[tokio::test]
    async fn test_json_store_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("nothing.json"));
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_json_store_corrupt_file_is_persistence_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{not json").unwrap();
        let err = JsonFileStore::new(&path).load().await.unwrap_err();
        assert!(matches!(err, BrainError::Persistence(_)));
    }
}
