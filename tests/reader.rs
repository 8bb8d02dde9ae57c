mod common;

use chrono::{TimeZone, Utc};
use common::{fast_serial_settings, wait_until, CaptureDisplay, FakeOpener};
use serterm::display::TerminalDisplay;
use serterm::queue::Queue;
use serterm::reader::Reader;
use serterm::session_log::SessionLog;
use serterm::shutdown::ShutdownCoordinator;
use serterm::transport::{SerialTransport, Transport};
use std::fs;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

fn session_log(dir: &TempDir) -> SessionLog {
    let started = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
    SessionLog::create(dir.path(), started).unwrap()
}

fn log_lines(log: &SessionLog) -> Vec<String> {
    match fs::read_to_string(log.path()) {
        Ok(content) => content.lines().map(str::to_string).collect(),
        Err(_) => Vec::new(),
    }
}

fn feed<D: serterm::display::DisplaySink>(reader: &mut Reader<D>, text: &str) {
    for unit in text.chars() {
        reader.accept(unit);
    }
}

#[test]
fn one_record_per_terminated_line() {
    let dir = TempDir::new().unwrap();
    let log = session_log(&dir);
    let shutdown = ShutdownCoordinator::new();
    let mut reader = Reader::new(
        Queue::new(),
        Some(log.clone()),
        CaptureDisplay::default(),
        shutdown.handle(),
    );

    feed(&mut reader, "ok T:21.3\nok");

    let lines = log_lines(&log);
    assert_eq!(lines.len(), 1);
    let (stamp, text) = lines[0].split_once(' ').unwrap();
    assert_eq!(text, "ok T:21.3");
    assert!(stamp.ends_with('Z'));
    assert_eq!(stamp.len(), "2024-03-09T14:05:07.123456Z".len());
    assert_eq!(reader.pending(), "ok");
}

#[test]
fn blank_lines_are_not_logged() {
    let dir = TempDir::new().unwrap();
    let log = session_log(&dir);
    let shutdown = ShutdownCoordinator::new();
    let mut reader = Reader::new(
        Queue::new(),
        Some(log.clone()),
        CaptureDisplay::default(),
        shutdown.handle(),
    );

    feed(&mut reader, "\n\nstart\n\n\necho:busy\n");

    let texts: Vec<String> = log_lines(&log)
        .into_iter()
        .map(|line| line.split_once(' ').unwrap().1.to_string())
        .collect();
    assert_eq!(texts, vec!["start", "echo:busy"]);
}

#[test]
fn carriage_returns_stay_in_the_record() {
    let dir = TempDir::new().unwrap();
    let log = session_log(&dir);
    let shutdown = ShutdownCoordinator::new();
    let mut reader = Reader::new(
        Queue::new(),
        Some(log.clone()),
        CaptureDisplay::default(),
        shutdown.handle(),
    );

    feed(&mut reader, "ok\r\n");

    let content = fs::read_to_string(log.path()).unwrap();
    assert!(content.ends_with(" ok\r\n"));
}

#[test]
fn every_unit_reaches_the_display() {
    let shutdown = ShutdownCoordinator::new();
    let display = CaptureDisplay::default();
    let mut reader = Reader::new(Queue::new(), None, display.clone(), shutdown.handle());

    feed(&mut reader, "\nok\n");

    assert_eq!(display.shown(), "\nok\n");
}

#[test]
fn show_control_mode_prints_escapes() {
    let shutdown = ShutdownCoordinator::new();
    let display = TerminalDisplay::new(Vec::new(), true, false);
    let mut reader = Reader::new(Queue::new(), None, display, shutdown.handle());

    feed(&mut reader, "ok\r\n");

    let shown = String::from_utf8(reader.display().get_ref().clone()).unwrap();
    assert_eq!(shown, "ok\\r\\n");
}

#[test]
fn line_tap_mirrors_completed_lines() {
    let shutdown = ShutdownCoordinator::new();
    let (tap, lines) = mpsc::channel();
    let mut reader = Reader::new(Queue::new(), None, CaptureDisplay::default(), shutdown.handle())
        .with_line_tap(tap);

    feed(&mut reader, "echo:start\n\nok\npartial");

    let received: Vec<String> = lines.try_iter().collect();
    assert_eq!(received, vec!["echo:start", "ok"]);
}

#[test]
fn run_consumes_the_inbound_queue_until_shutdown() {
    let shutdown = ShutdownCoordinator::new();
    let inbound = Queue::new();
    let display = CaptureDisplay::default();
    let reader = Reader::new(inbound.clone(), None, display.clone(), shutdown.handle());
    let worker = thread::spawn(move || reader.run());

    for unit in "wait\n".chars() {
        inbound.push(unit);
    }
    assert!(wait_until(Duration::from_secs(5), || display.shown() == "wait\n"));

    shutdown.signal();
    worker.join().unwrap();
    assert!(inbound.is_empty());
}

/// Move whatever the port has buffered through the transport into `reader`.
fn pump<D: serterm::display::DisplaySink>(
    transport: &mut SerialTransport<FakeOpener>,
    reader: &mut Reader<D>,
) {
    for _ in 0..32 {
        if let Some(unit) = transport.read() {
            reader.accept(unit);
        }
    }
}

fn connected_port() -> (SerialTransport<FakeOpener>, FakeOpener) {
    let opener = FakeOpener::default();
    let mut transport = SerialTransport::new(
        opener.clone(),
        vec!["/dev/ttyUSB0".to_string()],
        fast_serial_settings(),
    );
    let shutdown = ShutdownCoordinator::new();
    transport.connect(&shutdown.handle()).unwrap();
    (transport, opener)
}

fn record_texts(log: &SessionLog) -> Vec<String> {
    log_lines(log)
        .into_iter()
        .map(|line| line.split_once(' ').unwrap().1.to_string())
        .collect()
}

#[test]
fn undecodable_byte_before_terminator_keeps_records_apart() {
    let dir = TempDir::new().unwrap();
    let log = session_log(&dir);
    let shutdown = ShutdownCoordinator::new();
    let mut reader = Reader::new(
        Queue::new(),
        Some(log.clone()),
        CaptureDisplay::default(),
        shutdown.handle(),
    );
    let (mut transport, opener) = connected_port();

    opener.feed_bytes(&[b'a', 0xC3, b'\n', b'b', b'\n']);
    pump(&mut transport, &mut reader);

    assert_eq!(record_texts(&log), vec!["a", "b"]);
    assert_eq!(reader.pending(), "");
    assert!(!transport.needs_reconnect());
}

#[test]
fn lead_byte_cut_off_by_timeout_keeps_records_apart() {
    let dir = TempDir::new().unwrap();
    let log = session_log(&dir);
    let shutdown = ShutdownCoordinator::new();
    let mut reader = Reader::new(
        Queue::new(),
        Some(log.clone()),
        CaptureDisplay::default(),
        shutdown.handle(),
    );
    let (mut transport, opener) = connected_port();

    opener.feed_bytes(&[b'o', b'k', 0xE2]);
    pump(&mut transport, &mut reader);
    opener.feed_bytes(b"\nT:21\n");
    pump(&mut transport, &mut reader);

    assert_eq!(record_texts(&log), vec!["ok", "T:21"]);
    assert_eq!(reader.pending(), "");
}
