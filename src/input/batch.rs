use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::{Duration, Instant};

use super::{finish_after_drain, INPUT_POLL};
use crate::queue::Queue;
use crate::shutdown::ShutdownHandle;

/// Pacing between lines of a piped script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowControl {
    /// Sleep a fixed time after each line.
    Delay(Duration),
    /// Wait until a received line contains `token`, giving up after
    /// `timeout` if one is set.
    Confirm {
        token: String,
        timeout: Option<Duration>,
    },
}

/// Sends a non-interactive stream line by line, e.g. a G-code file piped
/// into the terminal, for devices that need time or an `ok` per line.
pub struct BatchInput {
    lines: mpsc::Receiver<String>,
    outbound: Queue<String>,
    flow: FlowControl,
    confirmations: Option<mpsc::Receiver<String>>,
    shutdown: ShutdownHandle,
}

impl BatchInput {
    pub fn new(
        lines: mpsc::Receiver<String>,
        outbound: Queue<String>,
        flow: FlowControl,
        shutdown: ShutdownHandle,
    ) -> Self {
        Self {
            lines,
            outbound,
            flow,
            confirmations: None,
            shutdown,
        }
    }

    /// Completed device lines, needed for [`FlowControl::Confirm`].
    pub fn with_confirmations(mut self, confirmations: mpsc::Receiver<String>) -> Self {
        self.confirmations = Some(confirmations);
        self
    }

    /// Send every line, then wait for the outbound queue to empty and
    /// request shutdown. Returns the number of lines queued.
    pub fn run(mut self) -> usize {
        let mut sent = 0;
        loop {
            if self.shutdown.is_shutting_down() {
                return sent;
            }
            let line = match self.lines.recv_timeout(INPUT_POLL) {
                Ok(line) => line,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            };
            if line.is_empty() {
                continue;
            }

            self.discard_stale_confirmations();
            tracing::debug!(line = %line, "sending");
            self.outbound.push(line);
            sent += 1;

            if !self.pace() {
                return sent;
            }
        }

        tracing::info!(lines = sent, "input finished, waiting for queue to drain");
        finish_after_drain(&self.outbound, &self.shutdown);
        sent
    }

    /// Returns `false` when shutdown interrupted the wait.
    fn pace(&mut self) -> bool {
        match self.flow.clone() {
            FlowControl::Delay(delay) => self.shutdown.sleep(delay),
            FlowControl::Confirm { token, timeout } => self.await_confirmation(&token, timeout),
        }
    }

    fn await_confirmation(&mut self, token: &str, timeout: Option<Duration>) -> bool {
        let Some(confirmations) = &self.confirmations else {
            tracing::warn!("no confirmation source, not waiting for '{}'", token);
            return true;
        };
        let deadline = timeout.map(|timeout| Instant::now() + timeout);
        loop {
            if self.shutdown.is_shutting_down() {
                return false;
            }
            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    tracing::warn!(token, "no confirmation before timeout, continuing");
                    return true;
                }
            }
            match confirmations.recv_timeout(INPUT_POLL) {
                Ok(received) if received.contains(token) => return true,
                Ok(_) | Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    tracing::warn!("confirmation source closed, continuing without it");
                    self.confirmations = None;
                    return true;
                }
            }
        }
    }

    fn discard_stale_confirmations(&self) {
        if let Some(confirmations) = &self.confirmations {
            let stale = confirmations.try_iter().count();
            if stale > 0 {
                tracing::debug!(stale, "discarded unconsumed device lines");
            }
        }
    }
}
