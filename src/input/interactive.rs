use std::sync::mpsc::{self, RecvTimeoutError};

use super::history::History;
use super::{finish_after_drain, INPUT_POLL};
use crate::control;
use crate::display::DisplaySink;
use crate::lock::{LockCoordinator, LockState};
use crate::queue::Queue;
use crate::shutdown::ShutdownHandle;

/// A person at the keyboard.
///
/// An empty line is not data: it flips the lock file, which is how the user
/// hands the transport to another program and takes it back.
pub struct InteractiveInput<D: DisplaySink> {
    lines: mpsc::Receiver<String>,
    outbound: Queue<String>,
    lock: LockCoordinator,
    history: History,
    display: D,
    newline_on_submit: bool,
    shutdown: ShutdownHandle,
}

impl<D: DisplaySink> InteractiveInput<D> {
    pub fn new(
        lines: mpsc::Receiver<String>,
        outbound: Queue<String>,
        lock: LockCoordinator,
        display: D,
        shutdown: ShutdownHandle,
    ) -> Self {
        Self {
            lines,
            outbound,
            lock,
            history: History::disabled(),
            display,
            newline_on_submit: false,
            shutdown,
        }
    }

    pub fn with_history(mut self, history: History) -> Self {
        self.history = history;
        self
    }

    pub fn newline_on_submit(mut self, enabled: bool) -> Self {
        self.newline_on_submit = enabled;
        self
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    /// Process lines until shutdown or end of input. End of input requests
    /// shutdown for the whole session once queued lines have gone out.
    pub fn run(mut self) {
        while !self.shutdown.is_shutting_down() {
            match self.lines.recv_timeout(INPUT_POLL) {
                Ok(line) => self.submit(&line),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    tracing::debug!("input closed");
                    finish_after_drain(&self.outbound, &self.shutdown);
                    break;
                }
            }
        }
    }

    pub fn submit(&mut self, line: &str) {
        let mut message = control::decode(line);
        self.history.record(&message);

        if line.is_empty() {
            match self.lock.toggle() {
                Ok(LockState::Locked) => tracing::info!(
                    lock = %self.lock.path().display(),
                    "transport released; press enter on an empty line to take it back"
                ),
                Ok(LockState::Unlocked) => tracing::info!("transport reclaimed"),
                Err(err) => tracing::error!(error = %err, "could not toggle the lock"),
            }
            return;
        }

        if self.lock.is_locked() {
            tracing::warn!(
                lock = %self.lock.path().display(),
                "transport is locked, line not sent; press enter on an empty line to unlock"
            );
            return;
        }

        if self.newline_on_submit {
            message.push('\n');
        }
        self.display.echo(&message);
        self.outbound.push(message);
    }
}
