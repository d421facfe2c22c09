//! Append-only session log

use std::path::Path;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::event::HistoryEvent;
use crate::error::Result;

/// What a log entry records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogKind {
    Commit,
    Undo,
    Redo,
}

/// One entry of a session log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    #[serde(rename = "type")]
    pub kind: LogKind,
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
    /// The committed event; absent for undo and redo
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<HistoryEvent>,
}

impl LogEntry {
    pub fn commit(event: HistoryEvent) -> Self {
        Self {
            kind: LogKind::Commit,
            timestamp: now_millis(),
            data: Some(event),
        }
    }

    pub fn undo() -> Self {
        Self {
            kind: LogKind::Undo,
            timestamp: now_millis(),
            data: None,
        }
    }

    pub fn redo() -> Self {
        Self {
            kind: LogKind::Redo,
            timestamp: now_millis(),
            data: None,
        }
    }
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

pub fn logs_to_json(entries: &[LogEntry]) -> Result<String> {
    Ok(serde_json::to_string(entries)?)
}

pub fn logs_from_json(json: &str) -> Result<Vec<LogEntry>> {
    Ok(serde_json::from_str(json)?)
}

pub fn write_logs(path: impl AsRef<Path>, entries: &[LogEntry]) -> Result<()> {
    std::fs::write(path, logs_to_json(entries)?)?;
    Ok(())
}

pub fn read_logs(path: impl AsRef<Path>) -> Result<Vec<LogEntry>> {
    let json = std::fs::read_to_string(path)?;
    logs_from_json(&json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::event::NodeOptionEvent;
    use serde_json::json;

    #[test]
    fn test_entry_shape() {
        let entry = LogEntry::commit(NodeOptionEvent::new("node-1", "min", json!(1), json!(0)).into());
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["type"], "commit");
        assert!(json["timestamp"].as_i64().unwrap() > 0);
        assert_eq!(json["data"]["option"], "min");

        let undo = serde_json::to_value(LogEntry::undo()).unwrap();
        assert_eq!(undo["type"], "undo");
        assert!(undo.get("data").is_none());
    }

    #[test]
    fn test_write_and_read_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        let entries = vec![
            LogEntry::commit(NodeOptionEvent::new("node-1", "flag", json!(true), json!(false)).into()),
            LogEntry::undo(),
            LogEntry::redo(),
        ];

        write_logs(&path, &entries).unwrap();
        assert_eq!(read_logs(&path).unwrap(), entries);
    }
}
