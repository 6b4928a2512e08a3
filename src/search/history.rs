//! Bounded snapshot history
//!
//! Coarse-grained undo outside the search stack. Once full, pushing a new
//! snapshot evicts the oldest one.

use std::collections::VecDeque;

use super::snapshot::Snapshot;

#[derive(Debug, Clone)]
pub struct History {
    entries: VecDeque<Snapshot>,
    capacity: usize,
}

impl History {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    /// Append a snapshot, evicting the oldest entry when full
    pub fn push(&mut self, snapshot: Snapshot) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(snapshot);
    }

    /// Pop from the end while `skip` holds for the popped snapshot
    ///
    /// Returns the first popped snapshot for which `skip` is false (it is
    /// removed too), or `None` if the history ran out.
    pub fn pop_while<F>(&mut self, mut skip: F) -> Option<Snapshot>
    where
        F: FnMut(&Snapshot) -> bool,
    {
        while let Some(snapshot) = self.entries.pop_back() {
            if !skip(&snapshot) {
                return Some(snapshot);
            }
        }
        None
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Most recent snapshot
    pub fn last(&self) -> Option<&Snapshot> {
        self.entries.back()
    }

    /// Oldest first
    pub fn iter(&self) -> impl Iterator<Item = &Snapshot> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::BallState;
    use glam::Vec2;

    fn snap(ordinal: u64, time_ticks: u64) -> Snapshot {
        Snapshot {
            ball: BallState {
                pos: Vec2::ZERO,
                vel: Vec2::ZERO,
            },
            planks: Vec::new(),
            time_ticks,
            ordinal,
        }
    }

    #[test]
    fn test_push_evicts_oldest() {
        let mut history = History::new(3);
        for i in 0..5 {
            history.push(snap(i, i));
        }
        assert_eq!(history.len(), 3);
        let ordinals: Vec<_> = history.iter().map(|s| s.ordinal).collect();
        assert_eq!(ordinals, vec![2, 3, 4]);
        assert_eq!(history.last().unwrap().ordinal, 4);
    }

    #[test]
    fn test_pop_while_returns_first_failing() {
        let mut history = History::new(10);
        history.push(snap(0, 0));
        history.push(snap(1, 10));
        history.push(snap(2, 20));
        history.push(snap(3, 20));

        // Skip everything at or after tick 20
        let found = history.pop_while(|s| s.time_ticks >= 20).unwrap();
        assert_eq!(found.ordinal, 1);
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn test_pop_while_exhausts() {
        let mut history = History::new(10);
        history.push(snap(0, 0));
        history.push(snap(1, 1));
        assert!(history.pop_while(|_| true).is_none());
        assert!(history.is_empty());
    }

    #[test]
    fn test_clear() {
        let mut history = History::new(2);
        history.push(snap(0, 0));
        history.clear();
        assert!(history.is_empty());
        assert_eq!(history.capacity(), 2);
    }
}
