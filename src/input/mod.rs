//! Producers for the outbound queue.
//!
//! Lines come from a background thread so the input loops can wait with a
//! timeout and still notice shutdown while the user is idle.

mod batch;
mod history;
mod interactive;

pub use batch::{BatchInput, FlowControl};
pub use history::History;
pub use interactive::InteractiveInput;

use std::io::BufRead;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use crate::queue::Queue;
use crate::shutdown::ShutdownHandle;

/// Wait granularity of the input loops.
pub const INPUT_POLL: Duration = Duration::from_millis(100);

/// Block until the manager has taken every queued message, then request
/// shutdown. Returns early if something else requested shutdown first.
fn finish_after_drain(outbound: &Queue<String>, shutdown: &ShutdownHandle) {
    while !outbound.is_empty() {
        if !shutdown.sleep(INPUT_POLL) {
            return;
        }
    }
    shutdown.signal();
}

/// Read lines from `source` on a detached thread.
///
/// The returned channel disconnects at end of input or on a read error.
/// Line terminators are stripped.
pub fn spawn_line_reader<R>(source: R) -> std::io::Result<mpsc::Receiver<String>>
where
    R: BufRead + Send + 'static,
{
    let (sender, receiver) = mpsc::channel();
    thread::Builder::new()
        .name("input-lines".to_string())
        .spawn(move || {
            for line in source.lines() {
                match line {
                    Ok(line) => {
                        let line = line.strip_suffix('\r').unwrap_or(&line).to_string();
                        if sender.send(line).is_err() {
                            break;
                        }
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, "input stream failed");
                        break;
                    }
                }
            }
        })?;
    Ok(receiver)
}
