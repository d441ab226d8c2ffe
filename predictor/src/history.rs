//! Bounded window of recent snapshots used for trend and projection analysis

use std::collections::VecDeque;

use crate::snapshot::MetricsSnapshot;

/// Insertion-ordered buffer of the most recent snapshots.
///
/// Once `capacity` entries are held, every push evicts the oldest one.
#[derive(Debug, Clone)]
pub struct HistoryWindow {
    entries: VecDeque<MetricsSnapshot>,
    capacity: usize,
}

impl HistoryWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::new(),
            capacity,
        }
    }

    /// Append a snapshot, returning the evicted one if the window was full
    pub fn push(&mut self, snapshot: MetricsSnapshot) -> Option<MetricsSnapshot> {
        let evicted = if self.entries.len() == self.capacity {
            self.entries.pop_front()
        } else {
            None
        };
        self.entries.push_back(snapshot);
        evicted
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

    pub fn oldest(&self) -> Option<&MetricsSnapshot> {
        self.entries.front()
    }

    pub fn newest(&self) -> Option<&MetricsSnapshot> {
        self.entries.back()
    }

    /// The entry appended just before the newest one
    pub fn previous(&self) -> Option<&MetricsSnapshot> {
        self.entries.len().checked_sub(2).and_then(|idx| self.entries.get(idx))
    }

    /// Iterate from oldest to newest
    pub fn iter(&self) -> impl Iterator<Item = &MetricsSnapshot> {
        self.entries.iter()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Default for HistoryWindow {
    fn default() -> Self {
        Self::new(10)
    }
}
