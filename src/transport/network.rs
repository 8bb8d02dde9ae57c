use std::io;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use super::stream::Stream;
use super::{Transport, TransportError, TransportState};
use crate::shutdown::ShutdownHandle;

const SCHEMES: [&str; 2] = ["socket", "tcp"];

#[derive(Debug, Clone)]
pub struct NetworkSettings {
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
}

/// `socket://host:port` (or `tcp://`) as used by serial-over-TCP bridges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub scheme: String,
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn parse(raw: &str) -> Result<Self, TransportError> {
        let invalid = |reason: &str| TransportError::InvalidEndpoint {
            endpoint: raw.to_string(),
            reason: reason.to_string(),
        };

        let (scheme, rest) = raw
            .split_once("://")
            .ok_or_else(|| invalid("expected scheme://host:port"))?;
        let scheme = scheme.to_ascii_lowercase();
        if !SCHEMES.contains(&scheme.as_str()) {
            return Err(invalid(&format!(
                "unsupported scheme '{}', use one of: {}",
                scheme,
                SCHEMES.join(", ")
            )));
        }

        let authority = rest.trim_end_matches('/');
        let (host, port) = authority
            .rsplit_once(':')
            .ok_or_else(|| invalid("missing port"))?;
        let host = host.trim_start_matches('[').trim_end_matches(']');
        if host.is_empty() {
            return Err(invalid("missing host"));
        }
        let port = port
            .parse::<u16>()
            .map_err(|_| invalid(&format!("bad port '{}'", port)))?;

        Ok(Self {
            scheme,
            host: host.to_string(),
            port,
        })
    }

    fn resolve(&self) -> io::Result<Vec<SocketAddr>> {
        Ok((self.host.as_str(), self.port).to_socket_addrs()?.collect())
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.host.contains(':') {
            write!(f, "{}://[{}]:{}", self.scheme, self.host, self.port)
        } else {
            write!(f, "{}://{}:{}", self.scheme, self.host, self.port)
        }
    }
}

/// TCP tunnel to a device. One endpoint, no retry policy: if the endpoint
/// cannot be reached the session is over.
pub struct NetworkTransport {
    endpoint: String,
    settings: NetworkSettings,
    stream: Stream<TcpStream>,
}

impl NetworkTransport {
    pub fn new(endpoint: impl Into<String>, settings: NetworkSettings) -> Self {
        Self {
            endpoint: endpoint.into(),
            settings,
            stream: Stream::new(true, "the bridge may be forwarding at the wrong baud rate"),
        }
    }

    fn open(&self, endpoint: &Endpoint) -> Result<TcpStream, TransportError> {
        let unreachable = |source: io::Error| TransportError::Unreachable {
            endpoint: self.endpoint.clone(),
            source,
        };

        let addrs = endpoint.resolve().map_err(unreachable)?;
        let mut last_err = io::Error::new(io::ErrorKind::NotFound, "host resolved to no addresses");
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, self.settings.connect_timeout) {
                Ok(socket) => {
                    socket
                        .set_read_timeout(Some(self.settings.read_timeout))
                        .map_err(unreachable)?;
                    socket.set_nodelay(true).map_err(unreachable)?;
                    return Ok(socket);
                }
                Err(err) => last_err = err,
            }
        }
        Err(unreachable(last_err))
    }
}

impl Transport for NetworkTransport {
    fn connect(&mut self, _shutdown: &ShutdownHandle) -> Result<(), TransportError> {
        let endpoint = Endpoint::parse(&self.endpoint)?;
        self.stream.begin_connect();
        match self.open(&endpoint) {
            Ok(socket) => {
                tracing::info!(endpoint = %endpoint, "connected");
                self.stream.attach(&self.endpoint, socket);
                Ok(())
            }
            Err(err) => {
                self.stream.close();
                Err(err)
            }
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
        self.endpoint.clone()
    }
}

impl Drop for NetworkTransport {
    fn drop(&mut self) {
        self.stream.stop();
    }
}
