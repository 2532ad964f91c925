//! Activity log for the Image Chat GUI.
//!
//! Keeps recent entries in memory for the Logs view and appends every entry
//! to a per-session file under the data directory.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::settings::AppSettings;

/// Log level enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
    Debug,
    /// A prompt sent to the model.
    Prompt,
    /// A reply received from the model.
    Reply,
}

impl LogLevel {
    /// Get display string for the log level.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Info => "INFO",
            LogLevel::Success => "SUCCESS",
            LogLevel::Warning => "WARN",
            LogLevel::Error => "ERROR",
            LogLevel::Debug => "DEBUG",
            LogLevel::Prompt => "PROMPT",
            LogLevel::Reply => "REPLY",
        }
    }

    /// Get emoji for the log level.
    pub fn emoji(&self) -> &'static str {
        match self {
            LogLevel::Info => "ℹ️",
            LogLevel::Success => "✅",
            LogLevel::Warning => "⚠️",
            LogLevel::Error => "❌",
            LogLevel::Debug => "🔍",
            LogLevel::Prompt => "💬",
            LogLevel::Reply => "🤖",
        }
    }
}

/// A single log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Local>,
    pub level: LogLevel,
    pub message: String,
}

impl LogEntry {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            timestamp: Local::now(),
            level,
            message: message.into(),
        }
    }

    /// Format the log entry for display.
    pub fn format_display(&self) -> String {
        format!(
            "[{}] {} {}",
            self.timestamp.format("%H:%M:%S"),
            self.level.emoji(),
            self.message
        )
    }

    /// Format the log entry for file storage.
    pub fn format_file(&self) -> String {
        format!(
            "[{}] [{}] {}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
            self.level.as_str(),
            self.message
        )
    }
}

/// Logger that manages log entries in memory and on disk.
#[derive(Debug, Clone)]
pub struct Logger {
    entries: VecDeque<LogEntry>,
    max_entries: usize,
    /// Current session log file path.
    log_file: Option<PathBuf>,
}

impl Default for Logger {
    fn default() -> Self {
        Self::new()
    }
}

impl Logger {
    /// Create a logger writing to the application's logs directory.
    pub fn new() -> Self {
        let log_file = AppSettings::logs_dir().and_then(|dir| Self::create_log_file(&dir));
        Self::with_file(log_file)
    }

    /// Create a logger writing its session file into `dir`.
    pub fn in_dir(dir: &Path) -> Self {
        Self::with_file(Self::create_log_file(dir))
    }

    /// Create a logger that keeps entries in memory only.
    pub fn in_memory() -> Self {
        Self::with_file(None)
    }

    fn with_file(log_file: Option<PathBuf>) -> Self {
        Self {
            entries: VecDeque::new(),
            max_entries: 1000,
            log_file,
        }
    }

    /// Create a new log file for this session.
    fn create_log_file(dir: &Path) -> Option<PathBuf> {
        fs::create_dir_all(dir).ok()?;

        let timestamp = Local::now().format("%Y%m%d_%H%M%S");
        let id = Uuid::new_v4().simple().to_string();
        let path = dir.join(format!("session_{}_{}.log", timestamp, &id[..8]));

        File::create(&path).ok()?;

        Some(path)
    }

    /// Set how many entries are kept in memory.
    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries.max(1);
        self
    }

    /// Add a log entry.
    pub fn log(&mut self, level: LogLevel, message: impl Into<String>) {
        let entry = LogEntry::new(level, message);

        if let Some(ref path) = self.log_file {
            if let Ok(mut file) = OpenOptions::new().append(true).open(path) {
                let _ = writeln!(file, "{}", entry.format_file());
            }
        }

        self.entries.push_back(entry);
        while self.entries.len() > self.max_entries {
            self.entries.pop_front();
        }
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.log(LogLevel::Info, message);
    }

    pub fn success(&mut self, message: impl Into<String>) {
        self.log(LogLevel::Success, message);
    }

    pub fn warning(&mut self, message: impl Into<String>) {
        self.log(LogLevel::Warning, message);
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.log(LogLevel::Error, message);
    }

    pub fn debug(&mut self, message: impl Into<String>) {
        self.log(LogLevel::Debug, message);
    }

    pub fn prompt(&mut self, message: impl Into<String>) {
        self.log(LogLevel::Prompt, message);
    }

    pub fn reply(&mut self, message: impl Into<String>) {
        self.log(LogLevel::Reply, message);
    }

    /// Entries in the order they were logged.
    pub fn entries(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Clear the in-memory entries. The session file is kept.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Get the current log file path.
    pub fn log_file_path(&self) -> Option<&Path> {
        self.log_file.as_deref()
    }

    /// Get formatted log text for display.
    pub fn format_all(&self) -> String {
        self.entries
            .iter()
            .map(|e| e.format_display())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Session log files next to the current one, newest first.
    pub fn list_log_files(&self) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = self
            .log_file
            .as_deref()
            .and_then(Path::parent)
            .and_then(|dir| fs::read_dir(dir).ok())
            .map(|entries| {
                entries
                    .filter_map(|e| e.ok())
                    .map(|e| e.path())
                    .filter(|p| p.extension().map(|ext| ext == "log").unwrap_or(false))
                    .collect()
            })
            .unwrap_or_default();
        files.sort_by(|a, b| b.cmp(a));
        files
    }

    /// Read a log file's contents.
    pub fn read_log_file(path: &Path) -> Result<Vec<String>, String> {
        let file = File::open(path).map_err(|e| format!("Failed to open log file: {}", e))?;
        let reader = BufReader::new(file);
        Ok(reader.lines().map_while(Result::ok).collect())
    }
}
