//! Message Log
//!
//! Human-readable audit trail shown next to the table. Bounded: once full,
//! the oldest entry is dropped for every new one.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Default number of retained entries.
pub const DEFAULT_LOG_CAPACITY: usize = 200;

/// One log line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    /// When the entry was appended.
    pub at: DateTime<Utc>,
    /// Message text.
    pub text: String,
}

/// Bounded, append-only message log.
#[derive(Debug, Clone)]
pub struct MessageLog {
    entries: VecDeque<LogEntry>,
    capacity: usize,
    /// Total entries ever appended.
    appended: u64,
}

impl MessageLog {
    /// Create a log retaining at most `capacity` entries (minimum 1).
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity.min(DEFAULT_LOG_CAPACITY)),
            capacity,
            appended: 0,
        }
    }

    /// Append a message, evicting the oldest if full.
    pub fn push(&mut self, text: impl Into<String>) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(LogEntry {
            at: Utc::now(),
            text: text.into(),
        });
        self.appended += 1;
    }

    /// Retained entries, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    /// Most recent entry.
    pub fn last(&self) -> Option<&LogEntry> {
        self.entries.back()
    }

    /// Retained entry count.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// No entries retained.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum retained entries.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total entries ever appended, including evicted ones.
    pub fn appended(&self) -> u64 {
        self.appended
    }

    /// Entries evicted to stay within capacity.
    pub fn dropped(&self) -> u64 {
        self.appended - self.entries.len() as u64
    }

    /// Does any retained entry contain `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.entries.iter().any(|e| e.text.contains(needle))
    }
}

impl Default for MessageLog {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_LOG_CAPACITY)
    }
}
