//! Bounded activity log.
//!
//! Insertion-ordered ring of timestamped events, newest first. Appending
//! never blocks and never fails; anything past the capacity is dropped from
//! the back.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Default number of entries retained.
const DEFAULT_CAPACITY: usize = 20;

/// Severity/kind of an activity entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityKind {
    Info,
    Success,
    Warning,
    Ai,
}

/// A single entry in the activity log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub id: String,
    /// Wall-clock capture at append time, best-effort only
    pub timestamp: DateTime<Utc>,
    pub message: String,
    pub kind: ActivityKind,
}

/// Fixed-capacity ring of activity entries, newest first.
#[derive(Debug, Clone)]
pub struct ActivityLog {
    entries: VecDeque<ActivityEntry>,
    capacity: usize,
}

impl ActivityLog {
    /// Create a log with the default capacity of 20.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a log with a custom capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append an entry at the front, pruning anything past the capacity.
    pub fn record(&mut self, message: impl Into<String>, kind: ActivityKind) {
        self.entries.push_front(ActivityEntry {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            message: message.into(),
            kind,
        });

        while self.entries.len() > self.capacity {
            self.entries.pop_back();
        }
    }

    /// Entries newest first.
    pub fn entries(&self) -> impl Iterator<Item = &ActivityEntry> {
        self.entries.iter()
    }

    /// The most recent entry.
    pub fn latest(&self) -> Option<&ActivityEntry> {
        self.entries.front()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for ActivityLog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_newest_first_ordering() {
        let mut log = ActivityLog::new();
        log.record("first", ActivityKind::Info);
        log.record("second", ActivityKind::Success);

        assert_eq!(log.latest().unwrap().message, "second");
        let messages: Vec<_> = log.entries().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec!["second", "first"]);
    }

    #[test]
    fn test_ring_truncates_at_capacity() {
        let mut log = ActivityLog::new();
        for i in 0..25 {
            log.record(format!("event {}", i), ActivityKind::Info);
        }

        assert_eq!(log.len(), 20);
        assert_eq!(log.latest().unwrap().message, "event 24");
        // Oldest retained entry is event 5; 0-4 were dropped
        assert_eq!(log.entries().last().unwrap().message, "event 5");
    }

    #[test]
    fn test_custom_capacity() {
        let mut log = ActivityLog::with_capacity(3);
        for i in 0..5 {
            log.record(format!("e{}", i), ActivityKind::Warning);
        }

        assert_eq!(log.len(), 3);
        assert_eq!(log.latest().unwrap().kind, ActivityKind::Warning);
    }
}
