use std::io::{self, Read, Write};

use super::{is_timeout, TransportError, TransportState};

/// An open byte stream plus the bookkeeping both transports need: state,
/// the reconnect flag and UTF-8 unit assembly.
pub struct Stream<S> {
    handle: Option<S>,
    target: String,
    state: TransportState,
    /// A zero-length read means the peer went away (TCP) rather than "no
    /// data yet" (serial drivers).
    eof_is_disconnect: bool,
    decode_hint: &'static str,
    /// A byte that ended an invalid sequence; it starts the next unit.
    pushback: Option<u8>,
}

enum ReadOutcome {
    Unit(char),
    Nothing,
    Undecodable(Vec<u8>),
    Failed(io::Error),
}

impl<S: Read + Write> Stream<S> {
    pub fn new(eof_is_disconnect: bool, decode_hint: &'static str) -> Self {
        Self {
            handle: None,
            target: String::new(),
            state: TransportState::Disconnected,
            eof_is_disconnect,
            decode_hint,
            pushback: None,
        }
    }

    pub fn attach(&mut self, target: &str, handle: S) {
        self.handle = Some(handle);
        self.pushback = None;
        self.target = target.to_string();
        self.state = TransportState::Connected;
    }

    pub fn begin_connect(&mut self) {
        self.close();
        self.state = TransportState::Connecting;
    }

    pub fn close(&mut self) {
        self.pushback = None;
        if self.handle.take().is_some() {
            tracing::debug!(target_port = %self.target, "transport closed");
        }
        self.state = TransportState::Disconnected;
    }

    /// Close for good; the owning manager is exiting.
    pub fn stop(&mut self) {
        self.close();
        self.state = TransportState::Stopped;
    }

    pub fn is_open(&self) -> bool {
        self.handle.is_some()
    }

    pub fn needs_reconnect(&self) -> bool {
        self.state == TransportState::NeedsReconnect
    }

    pub fn state(&self) -> TransportState {
        self.state
    }

    pub fn read_unit(&mut self) -> Option<char> {
        let outcome = match self.handle.as_mut() {
            Some(handle) => read_one(handle, &mut self.pushback, self.eof_is_disconnect),
            None => return None,
        };
        match outcome {
            ReadOutcome::Unit(unit) => Some(unit),
            ReadOutcome::Nothing => None,
            ReadOutcome::Undecodable(bytes) => {
                tracing::warn!(
                    target_port = %self.target,
                    bytes = ?bytes,
                    "received bytes that are not valid UTF-8 ({})",
                    self.decode_hint
                );
                None
            }
            ReadOutcome::Failed(err) => {
                self.fail("read", &err);
                None
            }
        }
    }

    pub fn write_all(&mut self, data: &str) -> Result<(), TransportError> {
        let handle = self.handle.as_mut().ok_or(TransportError::NotOpen)?;
        let result = handle
            .write_all(data.as_bytes())
            .and_then(|()| handle.flush());
        result.map_err(|source| {
            self.fail("write", &source);
            TransportError::Io {
                target: self.target.clone(),
                source,
            }
        })
    }

    fn fail(&mut self, operation: &str, err: &io::Error) {
        tracing::warn!(
            target_port = %self.target,
            error = %err,
            "{} failed, will reconnect",
            operation
        );
        self.state = TransportState::NeedsReconnect;
    }
}

fn read_one<S: Read>(
    handle: &mut S,
    pushback: &mut Option<u8>,
    eof_is_disconnect: bool,
) -> ReadOutcome {
    let first = match pushback.take() {
        Some(byte) => byte,
        None => match read_byte(handle) {
            Ok(Some(byte)) => byte,
            Ok(None) if eof_is_disconnect => return ReadOutcome::Failed(closed_by_peer()),
            Ok(None) => return ReadOutcome::Nothing,
            Err(err) if is_timeout(&err) => return ReadOutcome::Nothing,
            Err(err) => return ReadOutcome::Failed(err),
        },
    };

    let width = utf8_width(first);
    if width == 0 {
        return ReadOutcome::Undecodable(vec![first]);
    }

    let mut bytes = vec![first];
    while bytes.len() < width {
        match read_byte(handle) {
            Ok(Some(byte)) if is_continuation(byte) => bytes.push(byte),
            // Not part of this sequence; it belongs to the next unit.
            Ok(Some(byte)) => {
                *pushback = Some(byte);
                return ReadOutcome::Undecodable(bytes);
            }
            Ok(None) if eof_is_disconnect => return ReadOutcome::Failed(closed_by_peer()),
            Ok(None) => return ReadOutcome::Undecodable(bytes),
            Err(err) if is_timeout(&err) => return ReadOutcome::Undecodable(bytes),
            Err(err) => return ReadOutcome::Failed(err),
        }
    }

    match std::str::from_utf8(&bytes) {
        Ok(text) => text
            .chars()
            .next()
            .map_or(ReadOutcome::Nothing, ReadOutcome::Unit),
        Err(_) => ReadOutcome::Undecodable(bytes),
    }
}

/// `Ok(None)` on a zero-length read.
fn read_byte<S: Read>(handle: &mut S) -> io::Result<Option<u8>> {
    let mut byte = [0u8; 1];
    match handle.read(&mut byte)? {
        0 => Ok(None),
        _ => Ok(Some(byte[0])),
    }
}

fn is_continuation(byte: u8) -> bool {
    (0x80..=0xBF).contains(&byte)
}

fn closed_by_peer() -> io::Error {
    io::Error::new(io::ErrorKind::UnexpectedEof, "connection closed by peer")
}

fn utf8_width(first: u8) -> usize {
    match first {
        0x00..=0x7F => 1,
        0xC2..=0xDF => 2,
        0xE0..=0xEF => 3,
        0xF0..=0xF4 => 4,
        _ => 0,
    }
}
