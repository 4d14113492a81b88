//! Bounded history ring

use crate::DetectionHistoryEntry;
use std::collections::VecDeque;

/// Default number of detections kept per user
pub const DEFAULT_CAPACITY: usize = 10;

/// FIFO ring of the most recent detections
#[derive(Debug, Clone)]
pub struct HistoryRing {
    /// Entries, oldest first
    entries: VecDeque<DetectionHistoryEntry>,
    /// Maximum retained entries
    capacity: usize,
    /// Total entries ever pushed (for statistics)
    total_pushed: u64,
}

impl HistoryRing {
    /// Create a ring holding at most `capacity` entries (minimum 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
            total_pushed: 0,
        }
    }

    /// Append an entry, evicting the oldest when full
    pub fn push(&mut self, entry: DetectionHistoryEntry) {
        if self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
        self.total_pushed += 1;
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

    pub fn total_pushed(&self) -> u64 {
        self.total_pushed
    }

    /// Entries, oldest first
    pub fn iter(&self) -> impl Iterator<Item = &DetectionHistoryEntry> {
        self.entries.iter()
    }

    /// Most recent entry
    pub fn latest(&self) -> Option<&DetectionHistoryEntry> {
        self.entries.back()
    }

    /// Copy of all entries, oldest first
    pub fn to_vec(&self) -> Vec<DetectionHistoryEntry> {
        self.entries.iter().cloned().collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Default for HistoryRing {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
