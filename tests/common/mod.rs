//! Shared test doubles.

#![allow(dead_code, unused_imports)]

use parking_lot::Mutex;
use serterm::display::DisplaySink;
use serterm::shutdown::ShutdownHandle;
use serterm::transport::{
    PortOpener, SerialSettings, Transport, TransportError, TransportState,
};
use std::collections::{HashMap, VecDeque};
use std::io::{self, Read, Write};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Something the scripted transport was asked to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Connect,
    Write(String),
    Read,
    Close,
}

#[derive(Default)]
struct Script {
    events: Vec<Event>,
    incoming: VecDeque<char>,
    refuse_connect: bool,
    fail_next_write: bool,
    reply: Option<String>,
}

/// Handle for steering a [`ScriptedTransport`] from the test thread.
#[derive(Clone, Default)]
pub struct ScriptControl {
    script: Arc<Mutex<Script>>,
}

impl ScriptControl {
    pub fn events(&self) -> Vec<Event> {
        self.script.lock().events.clone()
    }

    /// Events other than reads, which a running manager produces endlessly.
    pub fn significant_events(&self) -> Vec<Event> {
        self.events()
            .into_iter()
            .filter(|event| *event != Event::Read)
            .collect()
    }

    pub fn feed(&self, text: &str) {
        self.script.lock().incoming.extend(text.chars());
    }

    pub fn refuse_connect(&self) {
        self.script.lock().refuse_connect = true;
    }

    /// Answer every successful write with `reply`, like a device that
    /// acknowledges each command.
    pub fn reply_to_writes(&self, reply: &str) {
        self.script.lock().reply = Some(reply.to_string());
    }

    pub fn fail_next_write(&self) {
        self.script.lock().fail_next_write = true;
    }
}

/// In-memory transport that records every call.
pub struct ScriptedTransport {
    control: ScriptControl,
    state: TransportState,
}

impl ScriptedTransport {
    pub fn new() -> (Self, ScriptControl) {
        let control = ScriptControl::default();
        let transport = Self {
            control: control.clone(),
            state: TransportState::Disconnected,
        };
        (transport, control)
    }
}

impl Transport for ScriptedTransport {
    fn connect(&mut self, _shutdown: &ShutdownHandle) -> Result<(), TransportError> {
        let mut script = self.control.script.lock();
        script.events.push(Event::Connect);
        if script.refuse_connect {
            self.state = TransportState::Disconnected;
            return Err(TransportError::CandidatesExhausted {
                tried: vec!["scripted".to_string()],
            });
        }
        self.state = TransportState::Connected;
        Ok(())
    }

    fn read(&mut self) -> Option<char> {
        let unit = {
            let mut script = self.control.script.lock();
            script.events.push(Event::Read);
            script.incoming.pop_front()
        };
        if unit.is_none() {
            std::thread::sleep(Duration::from_millis(1));
        }
        unit
    }

    fn write(&mut self, data: &str) -> Result<(), TransportError> {
        let mut script = self.control.script.lock();
        if std::mem::take(&mut script.fail_next_write) {
            self.state = TransportState::NeedsReconnect;
            return Err(TransportError::Io {
                target: "scripted".to_string(),
                source: io::Error::new(io::ErrorKind::BrokenPipe, "unplugged"),
            });
        }
        script.events.push(Event::Write(data.to_string()));
        if let Some(reply) = script.reply.clone() {
            script.incoming.extend(reply.chars());
        }
        Ok(())
    }

    fn close(&mut self) {
        if self.is_open() {
            self.control.script.lock().events.push(Event::Close);
        }
        self.state = TransportState::Disconnected;
    }

    fn is_open(&self) -> bool {
        matches!(
            self.state,
            TransportState::Connected | TransportState::NeedsReconnect
        )
    }

    fn needs_reconnect(&self) -> bool {
        self.state == TransportState::NeedsReconnect
    }

    fn state(&self) -> TransportState {
        self.state
    }

    fn target(&self) -> String {
        "scripted".to_string()
    }
}

/// What a display was asked to show.
#[derive(Clone, Default)]
pub struct CaptureDisplay {
    pub shown: Arc<Mutex<String>>,
    pub echoed: Arc<Mutex<Vec<String>>>,
}

impl CaptureDisplay {
    pub fn shown(&self) -> String {
        self.shown.lock().clone()
    }

    pub fn echoed(&self) -> Vec<String> {
        self.echoed.lock().clone()
    }
}

impl DisplaySink for CaptureDisplay {
    fn show(&mut self, unit: char) {
        self.shown.lock().push(unit);
    }

    fn echo(&mut self, sent: &str) {
        self.echoed.lock().push(sent.to_string());
    }
}

/// Serial port stand-in: reads return fed bytes and time out once those
/// run out, writes are recorded.
pub struct FakePort {
    name: String,
    incoming: Arc<Mutex<VecDeque<u8>>>,
    written: Arc<Mutex<Vec<(String, String)>>>,
    broken: Arc<Mutex<bool>>,
}

impl Read for FakePort {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut incoming = self.incoming.lock();
        if incoming.is_empty() || buf.is_empty() {
            return Err(io::Error::new(io::ErrorKind::TimedOut, "timeout"));
        }
        let n = incoming.len().min(buf.len());
        for (slot, byte) in buf.iter_mut().zip(incoming.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

impl Write for FakePort {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if *self.broken.lock() {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "unplugged"));
        }
        self.written
            .lock()
            .push((self.name.clone(), String::from_utf8_lossy(buf).into_owned()));
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Opens [`FakePort`]s, failing a configured number of times per name.
#[derive(Clone, Default)]
pub struct FakeOpener {
    pub attempts: Arc<Mutex<Vec<String>>>,
    pub failures: Arc<Mutex<HashMap<String, usize>>>,
    pub written: Arc<Mutex<Vec<(String, String)>>>,
    pub broken: Arc<Mutex<bool>>,
    pub incoming: Arc<Mutex<VecDeque<u8>>>,
}

impl FakeOpener {
    /// Queue raw bytes for the open port to return.
    pub fn feed_bytes(&self, bytes: &[u8]) {
        self.incoming.lock().extend(bytes.iter().copied());
    }

    pub fn fail(&self, name: &str, times: usize) {
        self.failures.lock().insert(name.to_string(), times);
    }

    pub fn attempts(&self) -> Vec<String> {
        self.attempts.lock().clone()
    }

    /// Make writes on every port opened so far (and later) fail.
    pub fn unplug(&self, broken: bool) {
        *self.broken.lock() = broken;
    }
}

impl PortOpener for FakeOpener {
    type Port = FakePort;

    fn open(&mut self, target: &str, _settings: &SerialSettings) -> io::Result<FakePort> {
        self.attempts.lock().push(target.to_string());
        let mut failures = self.failures.lock();
        if let Some(remaining) = failures.get_mut(target) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(io::Error::new(io::ErrorKind::NotFound, "no such device"));
            }
        }
        Ok(FakePort {
            name: target.to_string(),
            incoming: Arc::clone(&self.incoming),
            written: Arc::clone(&self.written),
            broken: Arc::clone(&self.broken),
        })
    }
}

pub fn fast_serial_settings() -> SerialSettings {
    SerialSettings {
        baud_rate: 115_200,
        timeout: Duration::from_millis(5),
        reconnect_delay: Duration::from_millis(1),
    }
}

/// Poll `condition` until it holds or `timeout` passes.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}
