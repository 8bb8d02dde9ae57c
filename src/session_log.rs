use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionLogError {
    #[error("log directory '{0}' does not exist")]
    MissingDirectory(PathBuf),

    #[error("log path '{0}' is not a directory")]
    NotADirectory(PathBuf),
}

/// One received line, stamped when its terminator arrived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub timestamp: DateTime<Utc>,
    pub text: String,
}

impl LogRecord {
    pub fn now(text: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            text: text.into(),
        }
    }
}

impl std::fmt::Display for LogRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {}",
            self.timestamp.to_rfc3339_opts(SecondsFormat::Micros, true),
            self.text
        )
    }
}

/// Append-only log of device output for one session.
///
/// Every append opens and closes the file so that a crash or unplug loses at
/// most the line being written.
#[derive(Debug, Clone)]
pub struct SessionLog {
    path: PathBuf,
}

impl SessionLog {
    /// Pick the log file for a session started at `started_at` inside `dir`.
    /// The directory must already exist.
    pub fn create(dir: &Path, started_at: DateTime<Utc>) -> Result<Self, SessionLogError> {
        if !dir.exists() {
            return Err(SessionLogError::MissingDirectory(dir.to_path_buf()));
        }
        if !dir.is_dir() {
            return Err(SessionLogError::NotADirectory(dir.to_path_buf()));
        }
        let name = format!("{}.log", started_at.format("%Y-%m-%d_%H-%M-%S"));
        Ok(Self {
            path: dir.join(name),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, record: &LogRecord) -> io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", record)
    }
}
