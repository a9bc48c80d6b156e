//! Per-stream thought lines: short notes each committed turn leaves behind
//! in the emotional, logical, memory, inspiration and consciousness streams.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};

pub const STREAM_EMOTIONAL: &str = "emotional";
pub const STREAM_LOGICAL: &str = "logical";
pub const STREAM_MEMORY: &str = "memory";
pub const STREAM_INSPIRATION: &str = "inspiration";
pub const STREAM_CONSCIOUSNESS: &str = "consciousness";

pub const STREAM_NAMES: [&str; 5] = [
    STREAM_EMOTIONAL,
    STREAM_LOGICAL,
    STREAM_MEMORY,
    STREAM_INSPIRATION,
    STREAM_CONSCIOUSNESS,
];

/// Lines kept per stream.
pub const DEFAULT_THOUGHT_CAPACITY: usize = 24;
/// Longer lines are cut to this many chars.
pub const MAX_THOUGHT_CHARS: usize = 80;

pub fn is_stream(name: &str) -> bool {
    STREAM_NAMES.contains(&name)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThoughtStreams {
    capacity: usize,
    streams: BTreeMap<String, VecDeque<String>>,
}

impl Default for ThoughtStreams {
    fn default() -> Self {
        Self::new(DEFAULT_THOUGHT_CAPACITY)
    }
}

impl ThoughtStreams {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            streams: STREAM_NAMES
                .iter()
                .map(|s| (s.to_string(), VecDeque::new()))
                .collect(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append a line, dropping the oldest once the stream is full.
    /// Returns false for an unknown stream name.
    pub fn push(&mut self, stream: &str, line: impl AsRef<str>) -> bool {
        if !is_stream(stream) {
            tracing::debug!("Dropping thought for unknown stream '{}'", stream);
            return false;
        }
        let line: String = line.as_ref().trim().chars().take(MAX_THOUGHT_CHARS).collect();
        let buf = self.streams.entry(stream.to_string()).or_default();
        buf.push_back(line);
        while buf.len() > self.capacity {
            buf.pop_front();
        }
        true
    }

    /// The last `n` lines of a stream, oldest first.
    pub fn recent(&self, stream: &str, n: usize) -> Vec<&str> {
        let Some(buf) = self.streams.get(stream) else {
            return Vec::new();
        };
        let skip = buf.len().saturating_sub(n);
        buf.iter().skip(skip).map(String::as_str).collect()
    }

    pub fn len(&self, stream: &str) -> usize {
        self.streams.get(stream).map_or(0, VecDeque::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_is_bounded_per_stream() {
        let mut t = ThoughtStreams::new(2);
        for line in ["a", "b", "c"] {
            assert!(t.push(STREAM_LOGICAL, line));
        }
        assert_eq!(t.recent(STREAM_LOGICAL, 10), vec!["b", "c"]);
        assert_eq!(t.len(STREAM_MEMORY), 0);
    }

    #[test]
    fn test_recent_returns_newest_n_in_order() {
        let mut t = ThoughtStreams::default();
        for i in 0..5 {
            t.push(STREAM_MEMORY, format!("ST:{}", i));
        }
        assert_eq!(t.recent(STREAM_MEMORY, 2), vec!["ST:3", "ST:4"]);
        assert!(t.recent("dreams", 2).is_empty());
    }

    #[test]
    fn test_unknown_stream_rejected_and_long_lines_cut() {
        let mut t = ThoughtStreams::default();
        assert!(!t.push("dreams", "x"));
        t.push(STREAM_EMOTIONAL, "y".repeat(200));
        assert_eq!(t.recent(STREAM_EMOTIONAL, 1)[0].chars().count(), MAX_THOUGHT_CHARS);
    }
}
