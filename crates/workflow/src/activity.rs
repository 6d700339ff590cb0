//! Bounded recent-activity log shared across requests.

use std::collections::VecDeque;
use std::sync::Mutex;

use serde::Serialize;

/// Default number of entries kept.
pub const DEFAULT_ACTIVITY_CAPACITY: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityLevel {
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEntry {
    pub at: String,
    pub level: ActivityLevel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registration_id: Option<String>,
    pub message: String,
}

/// A ring buffer of the most recent activity; the oldest entry is evicted
/// once `capacity` is reached.
#[derive(Debug)]
pub struct ActivityLog {
    capacity: usize,
    entries: Mutex<VecDeque<ActivityEntry>>,
}

impl Default for ActivityLog {
    fn default() -> Self {
        Self::new(DEFAULT_ACTIVITY_CAPACITY)
    }
}

impl ActivityLog {
    /// A log holding at most `capacity` entries (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn record(
        &self,
        level: ActivityLevel,
        registration_id: Option<&str>,
        message: impl Into<String>,
    ) {
        let entry = ActivityEntry {
            at: a2p_storage::now_timestamp().unwrap_or_default(),
            level,
            registration_id: registration_id.map(str::to_string),
            message: message.into(),
        };
        let mut entries = self.entries.lock().unwrap_or_else(|p| p.into_inner());
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    pub fn info(&self, registration_id: Option<&str>, message: impl Into<String>) {
        self.record(ActivityLevel::Info, registration_id, message);
    }

    pub fn warn(&self, registration_id: Option<&str>, message: impl Into<String>) {
        self.record(ActivityLevel::Warn, registration_id, message);
    }

    pub fn error(&self, registration_id: Option<&str>, message: impl Into<String>) {
        self.record(ActivityLevel::Error, registration_id, message);
    }

    /// Current entries, newest first.
    pub fn recent(&self) -> Vec<ActivityEntry> {
        let entries = self.entries.lock().unwrap_or_else(|p| p.into_inner());
        entries.iter().rev().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evicts_oldest_at_capacity() {
        let log = ActivityLog::new(3);
        for n in 0..5 {
            log.info(None, format!("event {n}"));
        }
        let messages: Vec<String> = log.recent().into_iter().map(|e| e.message).collect();
        assert_eq!(messages, vec!["event 4", "event 3", "event 2"]);
        assert_eq!(log.len(), 3);
    }

    #[test]
    fn default_capacity_is_one_hundred() {
        let log = ActivityLog::default();
        for n in 0..150 {
            log.warn(Some("reg-1"), format!("event {n}"));
        }
        assert_eq!(log.capacity(), 100);
        assert_eq!(log.len(), 100);
        assert_eq!(log.recent()[0].message, "event 149");
    }

    #[test]
    fn zero_capacity_keeps_one_entry() {
        let log = ActivityLog::new(0);
        log.error(None, "a");
        log.error(None, "b");
        assert_eq!(log.len(), 1);
        assert_eq!(log.recent()[0].level, ActivityLevel::Error);
    }

    #[test]
    fn entries_serialize_camel_case() {
        let log = ActivityLog::new(2);
        log.info(Some("reg-9"), "stage started");
        let json = serde_json::to_value(&log.recent()[0]).unwrap();
        assert_eq!(json["registrationId"], "reg-9");
        assert_eq!(json["level"], "info");
        assert!(json["at"].as_str().is_some_and(|s| s.ends_with('Z')));
    }
}
