//! The loop that owns the transport.
//!
//! Each iteration does exactly one of three things: honour the lock file,
//! (re)connect, or move traffic. Moving traffic means writing every queued
//! outbound message and then a single bounded read, so the read timeout is
//! what paces the loop while connected.

use std::sync::mpsc;

use crate::lock::LockCoordinator;
use crate::queue::Queue;
use crate::shutdown::ShutdownHandle;
use crate::transport::{Transport, TransportError};

/// Appended to every outbound message.
pub const LINE_TERMINATOR: char = '\n';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagerState {
    Locked,
    Disconnected,
    Connected,
}

pub struct ConnectionManager<T: Transport> {
    transport: T,
    lock: LockCoordinator,
    outbound: Queue<String>,
    inbound: Queue<char>,
    shutdown: ShutdownHandle,
    first_connection: Option<mpsc::Sender<String>>,
    state: ManagerState,
}

impl<T: Transport> ConnectionManager<T> {
    pub fn new(
        transport: T,
        lock: LockCoordinator,
        outbound: Queue<String>,
        inbound: Queue<char>,
        shutdown: ShutdownHandle,
    ) -> Self {
        Self {
            transport,
            lock,
            outbound,
            inbound,
            shutdown,
            first_connection: None,
            state: ManagerState::Disconnected,
        }
    }

    /// Send the transport description on `notify` once the first connection
    /// succeeds. The sender is dropped when the manager exits, so a receiver
    /// sees a disconnect if that never happens.
    pub fn notify_first_connection(mut self, notify: mpsc::Sender<String>) -> Self {
        self.first_connection = Some(notify);
        self
    }

    pub fn state(&self) -> ManagerState {
        self.state
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Run until shutdown or a fatal connection error. The transport is
    /// closed on every exit, including unwinding.
    pub fn run(self) -> Result<(), TransportError> {
        let mut manager = scopeguard::guard(self, |mut manager| {
            manager.transport.close();
            tracing::debug!("connection manager stopped");
        });

        loop {
            if manager.shutdown.is_shutting_down() {
                return Ok(());
            }
            match manager.step() {
                Ok(_) => {}
                Err(TransportError::Cancelled) => return Ok(()),
                Err(err) => {
                    tracing::error!(error = %err, "connection lost for good");
                    manager.shutdown.signal();
                    return Err(err);
                }
            }
        }
    }

    /// One pass of the loop.
    pub fn step(&mut self) -> Result<ManagerState, TransportError> {
        if self.lock.is_locked() {
            if self.transport.is_open() {
                tracing::info!(
                    transport = %self.transport.target(),
                    lock = %self.lock.path().display(),
                    "lock file present, releasing transport"
                );
                self.transport.close();
            }
            self.enter(ManagerState::Locked);
            return Ok(self.state);
        }

        if !self.transport.is_open() || self.transport.needs_reconnect() {
            self.enter(ManagerState::Disconnected);
            self.transport.connect(&self.shutdown)?;
            if let Some(notify) = self.first_connection.take() {
                let _ = notify.send(self.transport.target());
            }
            self.enter(ManagerState::Connected);
            return Ok(self.state);
        }

        self.flush_outbound();
        // A failed write already means the next pass reconnects.
        if !self.transport.needs_reconnect() {
            if let Some(unit) = self.transport.read() {
                self.inbound.push(unit);
            }
        }
        Ok(self.state)
    }

    fn flush_outbound(&mut self) {
        while let Some(message) = self.outbound.try_pop() {
            let mut line = String::with_capacity(message.len() + 1);
            line.push_str(&message);
            line.push(LINE_TERMINATOR);
            if let Err(err) = self.transport.write(&line) {
                tracing::error!(message = %message, error = %err, "message not sent");
                break;
            }
        }
    }

    fn enter(&mut self, next: ManagerState) {
        if self.state == next {
            return;
        }
        match (self.state, next) {
            (_, ManagerState::Locked) => {
                tracing::info!(lock = %self.lock.path().display(), "transport locked by another user");
            }
            (ManagerState::Locked, _) => tracing::info!("lock released, reconnecting"),
            (from, to) => tracing::debug!(?from, ?to, "connection state"),
        }
        self.state = next;
    }
}
