use std::io::{self, Read, Write};
use std::time::Duration;

use serialport::SerialPort;

use super::backoff::Backoff;
use super::stream::Stream;
use super::{Transport, TransportError, TransportState};
use crate::shutdown::ShutdownHandle;

#[derive(Debug, Clone)]
pub struct SerialSettings {
    pub baud_rate: u32,
    /// Upper bound for a single read.
    pub timeout: Duration,
    /// First reconnect delay; later ones double up to [`Backoff::DEFAULT_MAX`].
    pub reconnect_delay: Duration,
}

/// Opens serial targets by name.
pub trait PortOpener: Send {
    type Port: Read + Write + Send;

    fn open(&mut self, target: &str, settings: &SerialSettings) -> io::Result<Self::Port>;
}

/// Real serial ports via the `serialport` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemPorts;

impl PortOpener for SystemPorts {
    type Port = Box<dyn SerialPort>;

    fn open(&mut self, target: &str, settings: &SerialSettings) -> io::Result<Self::Port> {
        serialport::new(target, settings.baud_rate)
            .timeout(settings.timeout)
            .open()
            .map_err(io::Error::from)
    }
}

/// Enumerate system ports and rank them by `markers`.
pub fn discover_candidates(markers: &[String]) -> Result<Vec<String>, TransportError> {
    let ports = serialport::available_ports()?;
    let names = ports.into_iter().map(|port| port.port_name).collect();
    Ok(rank_candidates(names, markers))
}

/// Sort port names so those containing a preferred marker come first, in
/// marker order, then by name.
pub fn rank_candidates(mut names: Vec<String>, markers: &[String]) -> Vec<String> {
    names.sort_by(|a, b| {
        let rank = |name: &str| {
            markers
                .iter()
                .position(|marker| name.contains(marker.as_str()))
                .unwrap_or(markers.len())
        };
        rank(a).cmp(&rank(b)).then_with(|| a.cmp(b))
    });
    names.dedup();
    names
}

/// Serial line with a sticky target.
///
/// The first connection walks the candidate list once, one attempt each.
/// After that the winning port is the only one ever retried, without limit,
/// so a device that re-enumerates under another name is not picked up by
/// accident.
pub struct SerialTransport<O: PortOpener> {
    opener: O,
    candidates: Vec<String>,
    selected: Option<String>,
    settings: SerialSettings,
    backoff: Backoff,
    stream: Stream<O::Port>,
}

impl<O: PortOpener> SerialTransport<O> {
    pub fn new(opener: O, candidates: Vec<String>, settings: SerialSettings) -> Self {
        let backoff = Backoff::new(settings.reconnect_delay, Backoff::DEFAULT_MAX);
        Self {
            opener,
            candidates,
            selected: None,
            settings,
            backoff,
            stream: Stream::new(false, "check that the baud rate matches the device"),
        }
    }

    /// Port chosen by the first successful connection.
    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn candidates(&self) -> &[String] {
        &self.candidates
    }

    fn first_connect(&mut self, shutdown: &ShutdownHandle) -> Result<(), TransportError> {
        let mut tried = Vec::with_capacity(self.candidates.len());
        for candidate in &self.candidates {
            if shutdown.is_shutting_down() {
                return Err(TransportError::Cancelled);
            }
            tried.push(candidate.clone());
            match self.opener.open(candidate, &self.settings) {
                Ok(port) => {
                    tracing::info!(
                        port = %candidate,
                        baud = self.settings.baud_rate,
                        "serial port opened"
                    );
                    self.stream.attach(candidate, port);
                    self.selected = Some(candidate.clone());
                    return Ok(());
                }
                Err(err) => {
                    tracing::warn!(port = %candidate, error = %err, "could not open serial port");
                }
            }
        }
        self.stream.close();
        Err(TransportError::CandidatesExhausted { tried })
    }

    fn reconnect(&mut self, target: &str, shutdown: &ShutdownHandle) -> Result<(), TransportError> {
        let mut attempt: u32 = 0;
        loop {
            if shutdown.is_shutting_down() {
                self.stream.close();
                return Err(TransportError::Cancelled);
            }
            attempt = attempt.saturating_add(1);
            match self.opener.open(target, &self.settings) {
                Ok(port) => {
                    tracing::info!(port = %target, attempt, "serial port reopened");
                    self.stream.attach(target, port);
                    return Ok(());
                }
                Err(err) => {
                    let delay = self.backoff.delay(attempt);
                    if attempt == 1 {
                        tracing::warn!(port = %target, error = %err, "serial port unavailable, retrying");
                    } else {
                        tracing::debug!(port = %target, attempt, ?delay, error = %err, "reopen failed");
                    }
                    shutdown.sleep(delay);
                }
            }
        }
    }
}

impl<O: PortOpener> Transport for SerialTransport<O> {
    fn connect(&mut self, shutdown: &ShutdownHandle) -> Result<(), TransportError> {
        self.stream.begin_connect();
        match self.selected.clone() {
            None => self.first_connect(shutdown),
            Some(target) => self.reconnect(&target, shutdown),
        }
    }

    fn read(&mut self) -> Option<char> {
        self.stream.read_unit()
    }

    fn write(&mut self, data: &str) -> Result<(), TransportError> {
        self.stream.write_all(data)
    }

    fn close(&mut self) {
        self.stream.close();
    }

    fn is_open(&self) -> bool {
        self.stream.is_open()
    }

    fn needs_reconnect(&self) -> bool {
        self.stream.needs_reconnect()
    }

    fn state(&self) -> TransportState {
        self.stream.state()
    }

    fn target(&self) -> String {
        match &self.selected {
            Some(port) => format!("{} @ {} baud", port, self.settings.baud_rate),
            None => format!("serial [{}]", self.candidates.join(", ")),
        }
    }
}

impl<O: PortOpener> Drop for SerialTransport<O> {
    fn drop(&mut self) {
        self.stream.stop();
    }
}
