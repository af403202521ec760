//! Bounded activity log store.
//!
//! A process-wide, newest-first ring buffer of at most [`MAX_ENTRIES`] log
//! entries. Entries are immutable once appended; the only removals are the
//! cap eviction and a bulk [`ActivityLog::clear`]. Appends are broadcast to
//! subscribers so consumers (the `watch` CLI, a UI) can tail the log live.

use std::collections::VecDeque;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Fixed log capacity; appending past this evicts the oldest entries.
pub const MAX_ENTRIES: usize = 50;

/// Severity of a log entry, matching the backend wire values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
    System,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Info => "INFO",
            LogLevel::Success => "SUCCESS",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
            LogLevel::System => "SYSTEM",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One activity log entry. Field names match the backend's JSON so an
/// embedded `activity_log` payload deserializes directly into this type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: String,
    #[serde(rename = "type")]
    pub level: LogLevel,
    pub message: String,
    #[serde(default)]
    pub container: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl LogEntry {
    pub fn new(level: LogLevel, message: impl Into<String>, container: Option<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            level,
            message: message.into(),
            container,
            timestamp: Utc::now(),
        }
    }

    /// Associated resource id, if any. The backend encodes "none" as an
    /// empty string, so both forms are treated as absent.
    pub fn container_ref(&self) -> Option<&str> {
        self.container.as_deref().filter(|c| !c.is_empty())
    }

    /// Render this entry as one line of the export format.
    pub fn render_line(&self) -> String {
        let stamp = self.timestamp.format("%Y-%m-%d %H:%M:%S");
        match self.container_ref() {
            Some(c) => format!("[{stamp}] {}: {} (Container: {c})", self.level, self.message),
            None => format!("[{stamp}] {}: {}", self.level, self.message),
        }
    }
}

/// Newest-first bounded log with a process-wide resource filter.
#[derive(Debug)]
pub struct ActivityLog {
    entries: VecDeque<LogEntry>,
    filter: Option<String>,
    tx: broadcast::Sender<LogEntry>,
}

impl ActivityLog {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(64);
        Self {
            entries: VecDeque::with_capacity(MAX_ENTRIES),
            filter: None,
            tx,
        }
    }

    /// Prepend an entry, evicting the oldest past the cap. Never fails.
    /// Subscribers are notified before `append` returns.
    pub fn append(&mut self, entry: LogEntry) {
        self.entries.push_front(entry.clone());
        self.entries.truncate(MAX_ENTRIES);
        let _ = self.tx.send(entry);
    }

    /// Drop every entry. The active filter is left untouched.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// All entries, newest first.
    pub fn entries(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    pub fn newest(&self) -> Option<&LogEntry> {
        self.entries.front()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries whose resource ref equals `container`, in stored order.
    pub fn filter_by<'a>(&'a self, container: &'a str) -> impl Iterator<Item = &'a LogEntry> {
        self.entries
            .iter()
            .filter(move |e| e.container_ref() == Some(container))
    }

    /// Set or clear the process-wide filter; `None` means unfiltered.
    pub fn set_filter(&mut self, container: Option<String>) {
        self.filter = container;
    }

    pub fn active_filter(&self) -> Option<&str> {
        self.filter.as_deref()
    }

    /// Entries visible under the active filter, in stored order.
    pub fn visible(&self) -> Vec<&LogEntry> {
        match self.filter.as_deref() {
            Some(c) => self.filter_by(c).collect(),
            None => self.entries.iter().collect(),
        }
    }

    /// Tail the log: every future append is delivered to the receiver.
    pub fn subscribe(&self) -> broadcast::Receiver<LogEntry> {
        self.tx.subscribe()
    }

    /// Plain-text export, one line per entry in stored (newest-first) order.
    pub fn export_text(&self) -> String {
        export_text(self.entries.iter())
    }
}

impl Default for ActivityLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Render entries as the export file body.
pub fn export_text<'a>(entries: impl Iterator<Item = &'a LogEntry>) -> String {
    entries
        .map(LogEntry::render_line)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Dated export filename, e.g. `docker-ant-logs-2025-06-01.txt`.
pub fn export_filename(now: DateTime<Utc>) -> String {
    format!("docker-ant-logs-{}.txt", now.format("%Y-%m-%d"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDateTime, Timelike};

    fn entry(level: LogLevel, message: &str, container: Option<&str>) -> LogEntry {
        LogEntry::new(level, message, container.map(str::to_string))
    }

    #[test]
    fn append_never_exceeds_cap() {
        let mut log = ActivityLog::new();
        for i in 0..120 {
            log.append(entry(LogLevel::Info, &format!("event {i}"), None));
            assert!(log.len() <= MAX_ENTRIES);
        }
        assert_eq!(log.len(), MAX_ENTRIES);
        // Newest first: the last append is at the front, the oldest kept
        // entry is `event 70`.
        assert_eq!(log.newest().unwrap().message, "event 119");
        assert_eq!(log.entries().last().unwrap().message, "event 70");
    }

    #[test]
    fn append_preserves_reverse_chronological_order() {
        let mut log = ActivityLog::new();
        for i in 0..10 {
            log.append(entry(LogLevel::Info, &format!("event {i}"), None));
        }
        let messages: Vec<_> = log.entries().map(|e| e.message.as_str()).collect();
        let expected: Vec<_> = (0..10).rev().map(|i| format!("event {i}")).collect();
        assert_eq!(messages, expected);
    }

    #[test]
    fn filter_by_returns_exact_subset_in_order() {
        let mut log = ActivityLog::new();
        log.append(entry(LogLevel::Info, "a", Some("web")));
        log.append(entry(LogLevel::Error, "b", Some("db")));
        log.append(entry(LogLevel::Success, "c", Some("web")));
        log.append(entry(LogLevel::Info, "d", None));

        let web: Vec<_> = log.filter_by("web").map(|e| e.message.as_str()).collect();
        assert_eq!(web, vec!["c", "a"]);

        assert_eq!(log.filter_by("cache").count(), 0);
        // Restartable: a second pass yields the same result.
        let again: Vec<_> = log.filter_by("web").map(|e| e.message.as_str()).collect();
        assert_eq!(again, vec!["c", "a"]);
    }

    #[test]
    fn empty_container_ref_is_treated_as_absent() {
        let mut log = ActivityLog::new();
        let mut e = entry(LogLevel::Info, "backend started", None);
        e.container = Some(String::new());
        log.append(e);
        assert_eq!(log.filter_by("").count(), 0);
        assert!(log.newest().unwrap().container_ref().is_none());
    }

    #[test]
    fn visible_honors_active_filter() {
        let mut log = ActivityLog::new();
        log.append(entry(LogLevel::Info, "a", Some("web")));
        log.append(entry(LogLevel::Info, "b", Some("db")));
        assert_eq!(log.visible().len(), 2);

        log.set_filter(Some("db".into()));
        let visible: Vec<_> = log.visible().iter().map(|e| e.message.as_str()).collect();
        assert_eq!(visible, vec!["b"]);

        log.set_filter(None);
        assert_eq!(log.visible().len(), 2);
    }

    #[test]
    fn clear_empties_but_keeps_filter() {
        let mut log = ActivityLog::new();
        log.set_filter(Some("web".into()));
        log.append(entry(LogLevel::Info, "a", Some("web")));
        log.clear();
        assert!(log.is_empty());
        assert_eq!(log.active_filter(), Some("web"));
    }

    #[test]
    fn subscribers_see_appends() {
        let mut log = ActivityLog::new();
        let mut rx = log.subscribe();
        log.append(entry(LogLevel::Success, "created", Some("abc")));
        let got = rx.try_recv().unwrap();
        assert_eq!(got.message, "created");
        assert_eq!(got.container_ref(), Some("abc"));
    }

    #[test]
    fn activity_log_wire_payload_deserializes() {
        let json = r#"{
            "id": "log-1718000000000",
            "type": "warning",
            "message": "Container stopped",
            "container": "abc123",
            "timestamp": "2025-06-10T07:33:20Z"
        }"#;
        let e: LogEntry = serde_json::from_str(json).unwrap();
        assert_eq!(e.level, LogLevel::Warning);
        assert_eq!(e.container_ref(), Some("abc123"));
    }

    /// Parse one export line back into (timestamp, level, message, container).
    fn parse_line(line: &str) -> (NaiveDateTime, String, String, Option<String>) {
        let (stamp, rest) = line[1..].split_once("] ").unwrap();
        let stamp = NaiveDateTime::parse_from_str(stamp, "%Y-%m-%d %H:%M:%S").unwrap();
        let (level, rest) = rest.split_once(": ").unwrap();
        let (message, container) = match rest.rsplit_once(" (Container: ") {
            Some((m, c)) => (m.to_string(), Some(c.trim_end_matches(')').to_string())),
            None => (rest.to_string(), None),
        };
        (stamp, level.to_string(), message, container)
    }

    #[test]
    fn export_round_trips_by_line() {
        let mut log = ActivityLog::new();
        log.append(entry(LogLevel::System, "Connected to Docker Ant backend", None));
        log.append(entry(LogLevel::Success, "Container created: web", Some("abc123")));
        log.append(entry(LogLevel::Error, "Failed to stop container", Some("def456")));

        let text = log.export_text();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), log.len());

        for (line, original) in lines.iter().zip(log.entries()) {
            let (stamp, level, message, container) = parse_line(line);
            assert_eq!(stamp, original.timestamp.naive_utc().with_nanosecond(0).unwrap());
            assert_eq!(level, original.level.as_str());
            assert_eq!(message, original.message);
            assert_eq!(container.as_deref(), original.container_ref());
        }
    }

    #[test]
    fn export_filename_is_dated() {
        let now = "2025-06-10T07:33:20Z".parse::<DateTime<Utc>>().unwrap();
        assert_eq!(export_filename(now), "docker-ant-logs-2025-06-10.txt");
    }
}
