//! Bounded in-memory activity log shown to the user.
//!
//! Every entry is mirrored to `tracing` so the rolling log file keeps the
//! full history after the ring buffer has dropped it.

use chrono::{DateTime, Local};
use serde::Serialize;
use std::collections::VecDeque;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Process,
    Success,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Info => "info",
            Severity::Process => "process",
            Severity::Success => "success",
            Severity::Error => "error",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Local>,
    pub message: String,
    pub severity: Severity,
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {:<7} {}",
            self.timestamp.format("%H:%M:%S"),
            self.severity,
            self.message
        )
    }
}

/// Ring buffer of the most recent `capacity` entries; oldest dropped first.
#[derive(Debug, Clone)]
pub struct ActivityLog {
    entries: VecDeque<LogEntry>,
    capacity: usize,
}

impl ActivityLog {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, severity: Severity, message: impl Into<String>) -> LogEntry {
        let entry = LogEntry {
            timestamp: Local::now(),
            message: message.into(),
            severity,
        };

        match severity {
            Severity::Info | Severity::Success => tracing::info!(severity = %severity, "{}", entry.message),
            Severity::Process => tracing::debug!(severity = %severity, "{}", entry.message),
            Severity::Error => tracing::error!(severity = %severity, "{}", entry.message),
        }

        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry.clone());
        entry
    }

    pub fn entries(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    pub fn latest(&self) -> Option<&LogEntry> {
        self.entries.back()
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

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ring_buffer_drops_oldest_first() {
        let mut log = ActivityLog::new(3);
        for i in 0..5 {
            log.push(Severity::Info, format!("entry {}", i));
        }

        assert_eq!(log.len(), 3);
        let messages: Vec<&str> = log.entries().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec!["entry 2", "entry 3", "entry 4"]);
        assert_eq!(log.latest().map(|e| e.message.as_str()), Some("entry 4"));
    }

    #[test]
    fn test_entries_keep_severity_and_order_in_time() {
        let mut log = ActivityLog::new(10);
        log.push(Severity::Process, "Converting a.heic");
        log.push(Severity::Error, "Failed b.heic");
        log.push(Severity::Success, "a.heic → a.jpg");

        let severities: Vec<Severity> = log.entries().map(|e| e.severity).collect();
        assert_eq!(
            severities,
            vec![Severity::Process, Severity::Error, Severity::Success]
        );
        let stamps: Vec<_> = log.entries().map(|e| e.timestamp).collect();
        assert!(stamps.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_zero_capacity_is_raised_to_one() {
        let mut log = ActivityLog::new(0);
        log.push(Severity::Info, "a");
        log.push(Severity::Info, "b");
        assert_eq!(log.capacity(), 1);
        assert_eq!(log.len(), 1);
        log.clear();
        assert!(log.is_empty());
    }

    #[test]
    fn test_entry_display_and_json() {
        let mut log = ActivityLog::new(2);
        let entry = log.push(Severity::Success, "IMG_1.heic → IMG_1.jpg");
        let line = entry.to_string();
        assert!(line.contains("success"));
        assert!(line.ends_with("IMG_1.heic → IMG_1.jpg"));

        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["severity"], "success");
    }
}
