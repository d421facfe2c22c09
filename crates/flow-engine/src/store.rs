//! Session log storage keyed by user and diagram file

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{FlowError, Result};
use crate::history::{read_logs, write_logs, LogEntry};

const LOG_FILE_SUFFIX: &str = ".log.json";

/// Session logs keyed by `(username, diagram filename)`
///
/// Logs are held in memory; with a directory configured every write is
/// also persisted as `<dir>/<username>/<filename>.log.json`.
#[derive(Debug, Default)]
pub struct LogStore {
    logs: HashMap<(String, String), Vec<LogEntry>>,
    directory: Option<PathBuf>,
}

impl LogStore {
    /// In-memory store
    pub fn new() -> Self {
        Self::default()
    }

    /// Store persisting to `directory`
    pub fn with_directory(directory: impl Into<PathBuf>) -> Self {
        Self {
            logs: HashMap::new(),
            directory: Some(directory.into()),
        }
    }

    pub fn directory(&self) -> Option<&Path> {
        self.directory.as_deref()
    }

    fn file_path(&self, username: &str, filename: &str) -> Result<Option<PathBuf>> {
        check_key(username)?;
        check_key(filename)?;
        Ok(self
            .directory
            .as_ref()
            .map(|dir| dir.join(username).join(format!("{}{}", filename, LOG_FILE_SUFFIX))))
    }

    /// Replace the stored log
    pub fn save(&mut self, username: &str, filename: &str, entries: Vec<LogEntry>) -> Result<()> {
        if let Some(path) = self.file_path(username, filename)? {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            write_logs(&path, &entries)?;
            log::debug!("saved {} log entries to {:?}", entries.len(), path);
        }
        self.logs
            .insert((username.to_string(), filename.to_string()), entries);
        Ok(())
    }

    /// Append to the stored log, creating it if absent
    pub fn append(&mut self, username: &str, filename: &str, entries: &[LogEntry]) -> Result<()> {
        let mut all = self.load(username, filename)?;
        all.extend_from_slice(entries);
        self.save(username, filename, all)
    }

    /// Stored log; empty if there is none
    pub fn load(&mut self, username: &str, filename: &str) -> Result<Vec<LogEntry>> {
        let key = (username.to_string(), filename.to_string());
        if let Some(entries) = self.logs.get(&key) {
            return Ok(entries.clone());
        }
        let Some(path) = self.file_path(username, filename)? else {
            return Ok(Vec::new());
        };
        if !path.exists() {
            return Ok(Vec::new());
        }
        let entries = read_logs(&path)?;
        log::debug!("loaded {} log entries from {:?}", entries.len(), path);
        self.logs.insert(key, entries.clone());
        Ok(entries)
    }

    /// Diagram filenames with a stored log for `username`, sorted
    pub fn filenames(&self, username: &str) -> Vec<String> {
        let mut names: Vec<String> = self
            .logs
            .keys()
            .filter(|(user, _)| user == username)
            .map(|(_, file)| file.clone())
            .collect();
        names.sort();
        names
    }
}

/// Keys become path components and must not escape the store directory
fn check_key(key: &str) -> Result<()> {
    if key.is_empty() || key == "." || key == ".." || key.contains(['/', '\\']) {
        return Err(FlowError::InvalidLogKey(key.to_string()));
    }
    Ok(())
}
