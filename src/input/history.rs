use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::control;

/// Plain-text input history, one entry per line.
///
/// Entries are the messages as sent, with control units already decoded.
/// On disk they are escape-encoded so `M117 hi` plus a line feed stays a
/// single line of the file; [`History::entries`] undoes that exactly.
#[derive(Debug, Clone)]
pub struct History {
    path: Option<PathBuf>,
}

impl History {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    /// History that records nothing.
    pub fn disabled() -> Self {
        Self { path: None }
    }

    /// `~/.local/share/serterm/history` or the platform equivalent.
    pub fn default_path() -> PathBuf {
        let data_dir = dirs::data_dir().unwrap_or_else(|| PathBuf::from("."));
        data_dir.join("serterm").join("history")
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Append one entry. Failures are reported and otherwise ignored.
    pub fn record(&self, line: &str) {
        let Some(path) = &self.path else {
            return;
        };
        if let Err(err) = append_entry(path, line) {
            tracing::warn!(path = %path.display(), error = %err, "could not save input history");
        }
    }

    pub fn entries(&self) -> io::Result<Vec<String>> {
        let Some(path) = &self.path else {
            return Ok(Vec::new());
        };
        match fs::read_to_string(path) {
            Ok(content) => Ok(content.lines().map(control::decode).collect()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(err) => Err(err),
        }
    }
}

fn append_entry(path: &Path, line: &str) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{}", control::encode(line))
}
