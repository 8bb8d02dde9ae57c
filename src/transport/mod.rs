//! Character transports: a serial line or a TCP tunnel to one.
//!
//! Both variants share the same contract. `read` yields at most one unit
//! within the configured timeout and `write` either flushes everything or
//! fails. Errors on an open connection never escape: they are logged and
//! recorded as a reconnect request for the connection manager.

mod backoff;
mod network;
mod serial;
mod stream;

pub use backoff::Backoff;
pub use network::{Endpoint, NetworkSettings, NetworkTransport};
pub use serial::{
    discover_candidates, rank_candidates, PortOpener, SerialSettings, SerialTransport, SystemPorts,
};
pub use stream::Stream;

use std::io;

use thiserror::Error;

use crate::shutdown::ShutdownHandle;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("no serial port could be opened (tried {})", format_tried(.tried))]
    CandidatesExhausted { tried: Vec<String> },

    #[error("invalid network endpoint '{endpoint}': {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error("cannot reach '{endpoint}': {source}")]
    Unreachable {
        endpoint: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to list serial ports: {0}")]
    Discovery(#[from] serialport::Error),

    #[error("transport is not open")]
    NotOpen,

    #[error("I/O error on {target}: {source}")]
    Io {
        target: String,
        #[source]
        source: io::Error,
    },

    #[error("connection attempt cancelled by shutdown")]
    Cancelled,
}

fn format_tried(tried: &[String]) -> String {
    if tried.is_empty() {
        "none available".to_string()
    } else {
        tried.join(", ")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    Disconnected,
    Connecting,
    Connected,
    NeedsReconnect,
    Stopped,
}

pub trait Transport: Send {
    /// Open (or reopen) the connection following the variant's retry policy.
    fn connect(&mut self, shutdown: &ShutdownHandle) -> Result<(), TransportError>;

    /// Read at most one unit, waiting no longer than the configured timeout.
    fn read(&mut self) -> Option<char>;

    /// Write and flush `data`. A failure also flags the transport for
    /// reconnection.
    fn write(&mut self, data: &str) -> Result<(), TransportError>;

    fn close(&mut self);

    fn is_open(&self) -> bool;

    fn needs_reconnect(&self) -> bool;

    fn state(&self) -> TransportState;

    /// Human readable description of what this transport talks to.
    fn target(&self) -> String;
}

/// The two transports the terminal can run on, chosen once at startup.
pub enum AnyTransport {
    Serial(SerialTransport<SystemPorts>),
    Network(NetworkTransport),
}

impl Transport for AnyTransport {
    fn connect(&mut self, shutdown: &ShutdownHandle) -> Result<(), TransportError> {
        match self {
            AnyTransport::Serial(t) => t.connect(shutdown),
            AnyTransport::Network(t) => t.connect(shutdown),
        }
    }

    fn read(&mut self) -> Option<char> {
        match self {
            AnyTransport::Serial(t) => t.read(),
            AnyTransport::Network(t) => t.read(),
        }
    }

    fn write(&mut self, data: &str) -> Result<(), TransportError> {
        match self {
            AnyTransport::Serial(t) => t.write(data),
            AnyTransport::Network(t) => t.write(data),
        }
    }

    fn close(&mut self) {
        match self {
            AnyTransport::Serial(t) => t.close(),
            AnyTransport::Network(t) => t.close(),
        }
    }

    fn is_open(&self) -> bool {
        match self {
            AnyTransport::Serial(t) => t.is_open(),
            AnyTransport::Network(t) => t.is_open(),
        }
    }

    fn needs_reconnect(&self) -> bool {
        match self {
            AnyTransport::Serial(t) => t.needs_reconnect(),
            AnyTransport::Network(t) => t.needs_reconnect(),
        }
    }

    fn state(&self) -> TransportState {
        match self {
            AnyTransport::Serial(t) => t.state(),
            AnyTransport::Network(t) => t.state(),
        }
    }

    fn target(&self) -> String {
        match self {
            AnyTransport::Serial(t) => t.target(),
            AnyTransport::Network(t) => t.target(),
        }
    }
}

fn is_timeout(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    )
}
