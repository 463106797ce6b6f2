//! Bounded operator-visible event log. Diagnostic only: the sync engine never
//! consults it for control decisions.

use std::collections::VecDeque;

use serde::Serialize;
use utoipa::ToSchema;

use crate::dto::format_timestamp;

/// Default number of entries retained.
pub const DEFAULT_LOG_CAP: usize = 100;

/// Severity attached to an event log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Routine information.
    Info,
    /// An operation completed as intended.
    Success,
    /// Something degraded but the system recovered.
    Warning,
    /// An operation failed.
    Error,
}

/// One human-readable event.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LogEntry {
    /// RFC 3339 timestamp of when the event was appended.
    pub timestamp: String,
    /// Human-readable message.
    pub message: String,
    /// Severity of the event.
    pub severity: Severity,
}

/// Ordered, most-recent-first log capped at a fixed size.
#[derive(Debug)]
pub struct EventLog {
    entries: VecDeque<LogEntry>,
    cap: usize,
}

impl EventLog {
    /// Log bounded at `cap` entries.
    pub fn new(cap: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(cap),
            cap,
        }
    }

    /// Prepend an entry, silently dropping the oldest once the cap is hit.
    pub fn append(&mut self, message: impl Into<String>, severity: Severity) -> LogEntry {
        let entry = LogEntry {
            timestamp: format_timestamp(std::time::SystemTime::now()),
            message: message.into(),
            severity,
        };
        self.entries.push_front(entry.clone());
        while self.entries.len() > self.cap {
            self.entries.pop_back();
        }
        entry
    }

    /// Snapshot of the log, most recent first.
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.iter().cloned().collect()
    }

    /// Number of retained entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the log is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_CAP)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_most_recent_first() {
        let mut log = EventLog::default();
        log.append("first", Severity::Info);
        log.append("second", Severity::Success);

        let entries = log.entries();
        assert_eq!(entries[0].message, "second");
        assert_eq!(entries[1].message, "first");
    }

    #[test]
    fn one_hundred_first_entry_drops_the_oldest() {
        let mut log = EventLog::default();
        for i in 0..=DEFAULT_LOG_CAP {
            log.append(format!("event {i}"), Severity::Info);
        }

        assert_eq!(log.len(), DEFAULT_LOG_CAP);
        let entries = log.entries();
        assert_eq!(entries.first().unwrap().message, "event 100");
        // "event 0" was the oldest and must be gone.
        assert_eq!(entries.last().unwrap().message, "event 1");
    }

    #[test]
    fn smaller_cap_is_honored() {
        let mut log = EventLog::new(2);
        log.append("a", Severity::Info);
        log.append("b", Severity::Info);
        log.append("c", Severity::Info);
        assert_eq!(log.len(), 2);
        assert_eq!(log.entries()[1].message, "b");
    }
}
