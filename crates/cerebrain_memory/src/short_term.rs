use cerebrain_core::{ShortTermSnapshot, TurnRecord, TurnRole};
use std::collections::VecDeque;

/// Fixed-capacity FIFO of recent turns, oldest first.
#[derive(Debug, Clone, PartialEq)]
pub struct ShortTermMemory {
    capacity: usize,
    turns: VecDeque<TurnRecord>,
}

impl ShortTermMemory {
    /// A capacity of 0 is raised to 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            turns: VecDeque::with_capacity(capacity),
        }
    }

    /// Append a turn. Returns the evicted oldest turn when full.
    pub fn record(&mut self, turn: TurnRecord) -> Option<TurnRecord> {
        let evicted = if self.turns.len() >= self.capacity {
            self.turns.pop_front()
        } else {
            None
        };
        self.turns.push_back(turn);
        evicted
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.turns.len() >= self.capacity
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &TurnRecord> {
        self.turns.iter()
    }

    pub fn latest(&self) -> Option<&TurnRecord> {
        self.turns.back()
    }

    pub fn user_turns(&self) -> usize {
        self.turns.iter().filter(|t| t.role == TurnRole::User).count()
    }

    pub fn texts(&self) -> Vec<&str> {
        self.turns.iter().map(|t| t.text.as_str()).collect()
    }

    pub fn snapshot(&self) -> ShortTermSnapshot {
        ShortTermSnapshot {
            capacity: self.capacity,
            turns: self.turns.iter().cloned().collect(),
        }
    }

    /// Rebuild from a snapshot, keeping only the newest `capacity` turns.
    pub fn from_snapshot(snapshot: ShortTermSnapshot) -> Self {
        let mut memory = Self::new(snapshot.capacity);
        for turn in snapshot.turns {
            memory.record(turn);
        }
        memory
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn turn(text: &str) -> TurnRecord {
        TurnRecord::new(TurnRole::User, text, 0)
    }

    #[test]
    fn test_fifo_eviction_keeps_newest() {
        let mut stm = ShortTermMemory::new(2);
        assert!(stm.record(turn("a")).is_none());
        assert!(stm.record(turn("b")).is_none());
        let evicted = stm.record(turn("c")).unwrap();
        assert_eq!(evicted.text, "a");
        assert_eq!(stm.texts(), vec!["b", "c"]);
        assert!(stm.is_full());
    }

    #[test]
    fn test_iter_walks_both_ends() {
        let mut stm = ShortTermMemory::new(3);
        stm.record(turn("a"));
        stm.record(TurnRecord::new(TurnRole::Assistant, "b", 0));
        stm.record(turn("c"));
        let newest_first: Vec<&str> = stm.iter().rev().map(|t| t.text.as_str()).collect();
        assert_eq!(newest_first, vec!["c", "b", "a"]);
        let last_assistant = stm.iter().rev().find(|t| t.role == TurnRole::Assistant);
        assert_eq!(last_assistant.map(|t| t.text.as_str()), Some("b"));
    }

    #[test]
    fn test_zero_capacity_raised_to_one() {
        let mut stm = ShortTermMemory::new(0);
        stm.record(turn("a"));
        stm.record(turn("b"));
        assert_eq!(stm.capacity(), 1);
        assert_eq!(stm.texts(), vec!["b"]);
    }

    #[test]
    fn test_snapshot_restore_truncates_to_capacity() {
        let snapshot = ShortTermSnapshot {
            capacity: 2,
            turns: vec![turn("x"), turn("y"), turn("z")],
        };
        let stm = ShortTermMemory::from_snapshot(snapshot);
        assert_eq!(stm.texts(), vec!["y", "z"]);
        assert_eq!(stm.snapshot().turns.len(), 2);
    }

    #[test]
    fn test_user_turn_count() {
        let mut stm = ShortTermMemory::new(4);
        stm.record(turn("q"));
        stm.record(TurnRecord::new(TurnRole::Assistant, "a", 0));
        stm.record(turn("q2"));
        assert_eq!(stm.user_turns(), 2);
        assert_eq!(stm.latest().unwrap().text, "q2");
    }
}
