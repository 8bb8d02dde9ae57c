//! Wires the loops together for one terminal session.
//!
//! The connection manager and the reader get their own threads; input runs
//! on the caller's thread. They only meet through the two queues, the lock
//! file, the shutdown flag and two one-way channels.

use std::io::BufRead;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread::{self, JoinHandle};

use anyhow::{anyhow, Context, Result};
use chrono::Utc;

use crate::config::{InputMode, Settings, Target};
use crate::display::DisplaySink;
use crate::input::{self, BatchInput, History, InteractiveInput, INPUT_POLL};
use crate::lock::LockCoordinator;
use crate::manager::ConnectionManager;
use crate::queue::Queue;
use crate::reader::Reader;
use crate::session_log::SessionLog;
use crate::shutdown::{ShutdownCoordinator, ShutdownPhase};
use crate::signals::InterruptWatcher;
use crate::transport::{
    discover_candidates, AnyTransport, NetworkTransport, SerialTransport, SystemPorts, Transport,
    TransportError,
};

/// Where a session reads lines and shows traffic.
pub struct SessionIo<R, D> {
    pub input: R,
    /// Receives device output.
    pub received: D,
    /// Receives local echoes of interactive lines.
    pub echo: D,
}

/// Build the transport the settings ask for.
pub fn build_transport(settings: &Settings) -> Result<AnyTransport, TransportError> {
    let transport = match &settings.target {
        Target::Network(url) => {
            AnyTransport::Network(NetworkTransport::new(url.clone(), settings.network.clone()))
        }
        Target::Serial(port) => AnyTransport::Serial(SerialTransport::new(
            SystemPorts,
            vec![port.clone()],
            settings.serial.clone(),
        )),
        Target::Discover => {
            let candidates = discover_candidates(&settings.preferred_markers)?;
            tracing::debug!(?candidates, "serial candidates");
            AnyTransport::Serial(SerialTransport::new(
                SystemPorts,
                candidates,
                settings.serial.clone(),
            ))
        }
    };
    Ok(transport)
}

/// Run a session until input ends, an interrupt arrives or the connection
/// fails for good.
pub fn run<T, R, D>(settings: &Settings, transport: T, io: SessionIo<R, D>) -> Result<()>
where
    T: Transport + 'static,
    R: BufRead + Send + 'static,
    D: DisplaySink + 'static,
{
    let log = match &settings.log_dir {
        Some(dir) => {
            let log = SessionLog::create(dir, Utc::now()).context("Cannot start session log")?;
            tracing::info!(path = %log.path().display(), "logging session");
            Some(log)
        }
        None => None,
    };

    let coordinator = ShutdownCoordinator::new();
    let lock = LockCoordinator::new(&settings.lock_path);
    let outbound: Queue<String> = Queue::new();
    let inbound: Queue<char> = Queue::new();

    let watcher = InterruptWatcher::start(coordinator.handle())
        .context("Cannot install interrupt handler")?;
    let _watcher = scopeguard::guard(watcher, |watcher| {
        if let Some(watcher) = watcher {
            watcher.stop();
        }
    });

    let (connected_tx, connected_rx) = mpsc::channel();
    let manager = ConnectionManager::new(
        transport,
        lock.clone(),
        outbound.clone(),
        inbound.clone(),
        coordinator.handle(),
    )
    .notify_first_connection(connected_tx);
    let manager_thread = thread::Builder::new()
        .name("connection-manager".to_string())
        .spawn(move || manager.run())
        .context("Cannot start connection manager")?;

    let mut reader = Reader::new(inbound, log, io.received, coordinator.handle());
    let confirmations = match &settings.input {
        InputMode::Batch(input::FlowControl::Confirm { .. }) => {
            let (tap, confirmations) = mpsc::channel();
            reader = reader.with_line_tap(tap);
            Some(confirmations)
        }
        _ => None,
    };
    let reader_thread = match thread::Builder::new()
        .name("reader".to_string())
        .spawn(move || reader.run())
    {
        Ok(handle) => handle,
        Err(err) => {
            coordinator.signal();
            let _ = manager_thread.join();
            return Err(err).context("Cannot start reader");
        }
    };

    let connected = loop {
        if coordinator.is_shutting_down() {
            break false;
        }
        match connected_rx.recv_timeout(INPUT_POLL) {
            Ok(target) => {
                tracing::info!(transport = %target, "connected");
                break true;
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break false,
        }
    };

    if connected {
        let lines = input::spawn_line_reader(io.input).context("Cannot read input")?;
        match &settings.input {
            InputMode::Interactive => {
                let history = match &settings.history_path {
                    Some(path) => History::new(path),
                    None => History::disabled(),
                };
                InteractiveInput::new(lines, outbound, lock, io.echo, coordinator.handle())
                    .with_history(history)
                    .newline_on_submit(settings.newline_on_submit)
                    .run();
            }
            InputMode::Batch(flow) => {
                let mut batch =
                    BatchInput::new(lines, outbound, flow.clone(), coordinator.handle());
                if let Some(confirmations) = confirmations {
                    batch = batch.with_confirmations(confirmations);
                }
                let sent = batch.run();
                tracing::info!(lines = sent, "batch finished");
            }
        }
    }

    coordinator.signal();
    coordinator.advance(ShutdownPhase::JoiningWorkers);
    let outcome = join_workers(manager_thread, reader_thread);
    coordinator.advance(ShutdownPhase::Complete);

    match outcome {
        Ok(()) => Ok(()),
        Err(err) if !connected => Err(err).context("Never connected"),
        Err(err) => Err(err),
    }
}

fn join_workers(
    manager: JoinHandle<Result<(), TransportError>>,
    reader: JoinHandle<()>,
) -> Result<()> {
    let manager = manager.join();
    let reader = reader.join();
    reader.map_err(|_| anyhow!("reader panicked"))?;
    manager
        .map_err(|_| anyhow!("connection manager panicked"))?
        .map_err(anyhow::Error::from)
}
