//! Background input listener
//!
//! Keeps the device's input queue drained so unsolicited reports reach the
//! registered handler while nobody is actively reading.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use tracing::{debug, trace, warn};

use crate::device::Shared;
use crate::error::Result;
use crate::hidraw::HidrawIo;

/// Listener lifecycle; the thread handle is consumed by `stop`
pub(crate) enum Listener {
    Stopped,
    Running {
        running: Arc<AtomicBool>,
        thread: JoinHandle<()>,
    },
}

impl Listener {
    pub(crate) fn is_running(&self) -> bool {
        matches!(self, Listener::Running { .. })
    }

    /// Spawn the listener thread.
    ///
    /// # Panics
    /// If the listener is already running.
    pub(crate) fn start<D: HidrawIo + 'static>(
        &mut self,
        shared: Arc<Shared<D>>,
        thread_name: &str,
        error_backoff: Duration,
    ) -> Result<()> {
        assert!(!self.is_running(), "hidraw listener can only be started once");

        let running = Arc::new(AtomicBool::new(true));
        let running_clone = Arc::clone(&running);
        let thread = std::thread::Builder::new()
            .name(thread_name.to_string())
            .spawn(move || run_listener_loop(shared, running_clone, error_backoff))?;

        *self = Listener::Running { running, thread };
        Ok(())
    }

    /// Clear the running flag, wake the thread and join it. No-op when stopped.
    pub(crate) fn stop(&mut self, wake: impl FnOnce()) {
        if let Listener::Running { running, thread } = std::mem::replace(self, Listener::Stopped) {
            running.store(false, Ordering::Release);
            wake();
            if thread.join().is_err() {
                warn!("hidraw listener thread panicked");
            }
        }
    }
}

fn run_listener_loop<D: HidrawIo>(
    shared: Arc<Shared<D>>,
    running: Arc<AtomicBool>,
    error_backoff: Duration,
) {
    debug!("hidraw listener started");
    let mut byte = [0u8; 1];

    while running.load(Ordering::Acquire) {
        let result = {
            let _guard = shared.lock.acquire();
            shared.read_input_report(&mut byte, true)
        };

        match result {
            Ok(len) => trace!("Listener drained a {} byte report", len),
            Err(e) if e.is_transient() => {}
            Err(e) => {
                // Keep trying, the device might recover
                warn!("hidraw listener read error: {}", e);
                std::thread::sleep(error_backoff);
            }
        }

        shared.lock.yield_to_stealer();
    }

    debug!("hidraw listener exiting");
}
