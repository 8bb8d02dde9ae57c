use std::sync::mpsc;
use std::time::Duration;

use crate::display::DisplaySink;
use crate::manager::LINE_TERMINATOR;
use crate::queue::Queue;
use crate::session_log::{LogRecord, SessionLog};
use crate::shutdown::ShutdownHandle;

/// How long the reader waits on an empty queue before re-checking shutdown.
pub const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Turns the inbound unit stream into display output and log lines.
pub struct Reader<D: DisplaySink> {
    inbound: Queue<char>,
    log: Option<SessionLog>,
    display: D,
    shutdown: ShutdownHandle,
    line_tap: Option<mpsc::Sender<String>>,
    buffer: String,
}

impl<D: DisplaySink> Reader<D> {
    pub fn new(
        inbound: Queue<char>,
        log: Option<SessionLog>,
        display: D,
        shutdown: ShutdownHandle,
    ) -> Self {
        Self {
            inbound,
            log,
            display,
            shutdown,
            line_tap: None,
            buffer: String::new(),
        }
    }

    /// Mirror every completed, non-empty line to `tap`.
    pub fn with_line_tap(mut self, tap: mpsc::Sender<String>) -> Self {
        self.line_tap = Some(tap);
        self
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    /// The line assembled so far.
    pub fn pending(&self) -> &str {
        &self.buffer
    }

    pub fn run(mut self) {
        while !self.shutdown.is_shutting_down() {
            if let Some(unit) = self.inbound.pop_timeout(POLL_INTERVAL) {
                self.accept(unit);
            }
        }
        if !self.buffer.is_empty() {
            tracing::debug!(pending = %self.buffer, "unterminated line discarded at shutdown");
        }
    }

    pub fn accept(&mut self, unit: char) {
        if unit == LINE_TERMINATOR {
            self.finish_line();
        } else {
            self.buffer.push(unit);
        }
        self.display.show(unit);
    }

    fn finish_line(&mut self) {
        if self.buffer.is_empty() {
            return;
        }
        let line = std::mem::take(&mut self.buffer);
        if let Some(log) = &self.log {
            if let Err(err) = log.append(&LogRecord::now(line.as_str())) {
                tracing::warn!(path = %log.path().display(), error = %err, "could not write log record");
            }
        }
        if let Some(tap) = &self.line_tap {
            if tap.send(line).is_err() {
                self.line_tap = None;
            }
        }
    }
}
