use std::io;
#[cfg(unix)]
use std::thread;

#[cfg(unix)]
use signal_hook::consts::signal::{SIGINT, SIGTERM};
#[cfg(unix)]
use signal_hook::iterator::Signals;

use crate::shutdown::ShutdownHandle;

/// Turns SIGINT and SIGTERM into a shutdown request so every loop winds
/// down and the transport gets closed.
pub struct InterruptWatcher {
    #[cfg(unix)]
    handle: signal_hook::iterator::Handle,
    #[cfg(unix)]
    thread: thread::JoinHandle<()>,
}

impl InterruptWatcher {
    pub fn start(shutdown: ShutdownHandle) -> io::Result<Option<Self>> {
        #[cfg(unix)]
        {
            let mut signals = Signals::new([SIGINT, SIGTERM])?;
            let handle = signals.handle();
            let thread = thread::Builder::new()
                .name("signals".to_string())
                .spawn(move || {
                    for signal in signals.forever() {
                        tracing::debug!(signal, "interrupt received");
                        shutdown.signal();
                    }
                })?;
            Ok(Some(Self { handle, thread }))
        }

        #[cfg(not(unix))]
        {
            let _ = shutdown;
            Ok(None)
        }
    }

    pub fn stop(self) {
        #[cfg(unix)]
        {
            self.handle.close();
            let _ = self.thread.join();
        }
    }
}
