//! Append-only audit trail of attempted statements.

use chrono::{DateTime, Local};

/// Number of entries the interactive shell shows for `.history`.
pub const HISTORY_DISPLAY_LIMIT: usize = 50;

/// One attempted statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub query: String,
    pub timestamp: DateTime<Local>,
}

impl HistoryEntry {
    /// Timestamp as `YYYY-MM-DD HH:MM:SS`.
    pub fn time_label(&self) -> String {
        self.timestamp.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}

/// Ordered, unbounded sequence of [`HistoryEntry`] values.
#[derive(Debug, Clone, Default)]
pub struct QueryHistory {
    entries: Vec<HistoryEntry>,
}

impl QueryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, query: &str) {
        self.entries.push(HistoryEntry {
            query: query.to_string(),
            timestamp: Local::now(),
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    /// The most recent `n` entries, oldest first.
    pub fn recent(&self, n: usize) -> &[HistoryEntry] {
        let start = self.entries.len().saturating_sub(n);
        &self.entries[start..]
    }
}
