//! Thread-safe hidraw device handle
//!
//! A `HidrawDevice` owns the descriptor, the soft lock and (optionally) the
//! listener thread. All report I/O goes through `&self`, so one handle can be
//! shared between threads; starting and stopping the listener needs
//! `&mut self`, which keeps the listener state stable while anyone holds the
//! events lock.

use std::io;
use std::os::fd::AsFd;
use std::path::Path;
use std::sync::Arc;

use nix::errno::Errno;
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use parking_lot::Mutex;
use tracing::{debug, error, trace, warn};

use crate::config::HidrawConfig;
use crate::error::{HidrawError, Result};
use crate::event::EventHandler;
use crate::hidraw::{HidrawIo, HidrawNode};
use crate::listener::Listener;
use crate::soft_lock::{EventsLock, SoftLock};
use crate::types::{
    DeviceInfo, ReportKind, RequestType, HIDRAW_MAX_READ, HID_MAX_BUFFER_SIZE,
};

/// State shared between the handle and its listener thread
pub(crate) struct Shared<D> {
    pub(crate) io: D,
    pub(crate) lock: SoftLock,
    handler: Mutex<Option<Arc<dyn EventHandler>>>,
    poll_timeout: PollTimeout,
}

impl<D: HidrawIo> Shared<D> {
    /// Wait for one input report, or for an interrupt on the pipe.
    ///
    /// Returns the size of the report as read from the device; only
    /// `min(size, buf.len())` bytes are copied into `buf`.
    pub(crate) fn read_input_report(&self, buf: &mut [u8], propagate: bool) -> Result<usize> {
        check_len(buf.len(), HIDRAW_MAX_READ)?;

        let mut fds = [
            PollFd::new(self.io.as_fd(), PollFlags::POLLIN),
            PollFd::new(self.lock.interrupt_fd(), PollFlags::POLLIN),
        ];

        let ready = match poll(&mut fds, self.poll_timeout) {
            Ok(ready) => ready,
            Err(Errno::EINTR) => return Err(HidrawError::Interrupted),
            Err(e) => return Err(e.into()),
        };
        if ready == 0 {
            return Err(HidrawError::Timeout);
        }

        let interrupted = fds[1]
            .revents()
            .is_some_and(|events| events.contains(PollFlags::POLLIN));
        if interrupted {
            self.lock.drain_interrupts();
            return Err(HidrawError::Interrupted);
        }

        let mut read_buf = [0u8; HIDRAW_MAX_READ];
        let len = self.io.read_report(&mut read_buf)?;
        if len == 0 {
            // Reports are never empty; treat it as a broken device
            return Err(io::Error::from_raw_os_error(libc::EIO).into());
        }
        let report = &read_buf[..len];
        trace!("hidraw rx {} bytes: {:02X?}", len, &report[..len.min(16)]);

        if propagate {
            if let Err(e) = self.propagate(report) {
                warn!("Input report handler failed: {}", e);
            }
        }

        let copied = len.min(buf.len());
        buf[..copied].copy_from_slice(&report[..copied]);
        Ok(len)
    }

    fn propagate(&self, report: &[u8]) -> Result<()> {
        // Clone out so the handler runs without the registration lock held
        let handler = self.handler.lock().clone();
        match handler {
            Some(handler) => handler.raw_event(report),
            None => Ok(()),
        }
    }
}

fn check_len(len: usize, max: usize) -> Result<()> {
    if len < 1 || len > max {
        return Err(HidrawError::invalid_len(len, max));
    }
    Ok(())
}

/// An open hidraw device with optional background event listener
pub struct HidrawDevice<D: HidrawIo = HidrawNode> {
    shared: Arc<Shared<D>>,
    listener: Listener,
    config: HidrawConfig,
}

impl HidrawDevice<HidrawNode> {
    /// Open a `/dev/hidrawN` node
    pub fn open(path: impl AsRef<Path>, config: HidrawConfig) -> Result<Self> {
        let node = HidrawNode::open(path)?;
        Self::from_io(node, config)
    }

    /// Bus and USB identity of the node
    pub fn info(&self) -> Result<DeviceInfo> {
        self.shared.io.info()
    }

    pub fn path(&self) -> &Path {
        self.shared.io.path()
    }
}

impl<D: HidrawIo> HidrawDevice<D> {
    /// Wrap an already open descriptor, setting up the interrupt pipe and
    /// the soft lock. On failure `io` is dropped, closing the descriptor.
    pub fn from_io(io: D, config: HidrawConfig) -> Result<Self> {
        let lock = SoftLock::new().map_err(|e| {
            error!("Error while initializing hidraw: {}", e);
            HidrawError::Init(e)
        })?;

        let shared = Arc::new(Shared {
            io,
            lock,
            handler: Mutex::new(None),
            poll_timeout: config.poll_timeout_arg(),
        });

        Ok(Self {
            shared,
            listener: Listener::Stopped,
            config,
        })
    }

    pub fn io(&self) -> &D {
        &self.shared.io
    }

    pub fn config(&self) -> &HidrawConfig {
        &self.config
    }

    /// Register the handler that receives propagated input reports,
    /// replacing any previous one.
    pub fn set_event_handler(&self, handler: impl EventHandler + 'static) {
        *self.shared.handler.lock() = Some(Arc::new(handler));
    }

    pub fn clear_event_handler(&self) {
        *self.shared.handler.lock() = None;
    }

    pub fn events_running(&self) -> bool {
        self.listener.is_running()
    }

    /// Stop the listener and join it. No-op when it is not running.
    pub fn stop_events(&mut self) {
        if !self.listener.is_running() {
            return;
        }
        let lock = &self.shared.lock;
        self.listener.stop(|| lock.interrupt());
        // The wakeup may not have been consumed if the listener was between
        // cycles; later foreground reads must not see it.
        lock.drain_interrupts();
        debug!("hidraw listener stopped");
    }

    /// Take exclusive read ownership of the device.
    ///
    /// With the listener running, this interrupts its current poll and
    /// blocks until it has let go of the read path. Without a listener it
    /// returns immediately. Ownership ends when the returned lock is dropped.
    pub fn lock_events(&self) -> EventsLock<'_> {
        if !self.listener.is_running() {
            return EventsLock::uncontended(&self.shared.lock);
        }
        EventsLock::stolen(&self.shared.lock)
    }

    /// Wait up to the poll timeout for one input report.
    ///
    /// Returns the size of the report the device produced. If `buf` is
    /// shorter, the copy is truncated but the full size is still returned.
    /// With `propagate`, the registered handler sees the whole report.
    ///
    /// `lock` must come from [`lock_events`](Self::lock_events) on this
    /// device; a lock taken on another device is `InvalidArgument`.
    /// `Interrupted` means another thread asked for the device; retry after
    /// reacquiring the lock.
    ///
    /// Reading without holding the events lock does not compile:
    ///
    /// ```compile_fail
    /// # use hidraw_core::{HidrawConfig, HidrawDevice};
    /// # fn main() -> hidraw_core::Result<()> {
    /// let dev = HidrawDevice::open("/dev/hidraw0", HidrawConfig::default())?;
    /// let mut buf = [0u8; 64];
    /// dev.read_input_report(&mut buf, false)?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn read_input_report(
        &self,
        lock: &EventsLock<'_>,
        buf: &mut [u8],
        propagate: bool,
    ) -> Result<usize> {
        if !lock.guards(&self.shared.lock) {
            return Err(HidrawError::InvalidArgument(
                "events lock was taken on another device".into(),
            ));
        }
        self.shared.read_input_report(buf, propagate)
    }

    /// Issue a feature report control request.
    ///
    /// `buf.len()` is the report length including the report number byte.
    /// For `GetReport` the reply is copied into `buf` and its length is
    /// returned; for `SetReport`, `buf[0]` is overwritten with
    /// `report_number` and the whole buffer is sent.
    pub fn raw_request(
        &self,
        report_number: u8,
        buf: &mut [u8],
        kind: ReportKind,
        request: RequestType,
    ) -> Result<usize> {
        check_len(buf.len(), HID_MAX_BUFFER_SIZE)?;
        if kind != ReportKind::Feature {
            return Err(HidrawError::Unsupported(kind));
        }

        let _lock = self.lock_events();

        match request {
            RequestType::GetReport => {
                let mut scratch = vec![0u8; buf.len()];
                scratch[0] = report_number;
                let len = self.shared.io.get_feature(&mut scratch)?.min(buf.len());
                buf[..len].copy_from_slice(&scratch[..len]);
                trace!("GET_FEATURE 0x{:02X}: {:02X?}", report_number, &buf[..len.min(16)]);
                Ok(len)
            }
            RequestType::SetReport => {
                buf[0] = report_number;
                trace!("SET_FEATURE 0x{:02X}: {:02X?}", report_number, &buf[..buf.len().min(16)]);
                Ok(self.shared.io.set_feature(buf)?)
            }
        }
    }

    /// Shorthand for a feature `GetReport`
    pub fn get_feature_report(&self, report_number: u8, buf: &mut [u8]) -> Result<usize> {
        self.raw_request(report_number, buf, ReportKind::Feature, RequestType::GetReport)
    }

    /// Shorthand for a feature `SetReport`
    pub fn set_feature_report(&self, report_number: u8, buf: &mut [u8]) -> Result<usize> {
        self.raw_request(report_number, buf, ReportKind::Feature, RequestType::SetReport)
    }

    /// Write one output report straight to the device
    pub fn write_output_report(&self, buf: &[u8]) -> Result<()> {
        check_len(buf.len(), HID_MAX_BUFFER_SIZE)?;

        let written = self.shared.io.write_report(buf)?;
        if written != buf.len() {
            return Err(HidrawError::ShortWrite {
                written,
                expected: buf.len(),
            });
        }
        trace!("hidraw tx {} bytes: {:02X?}", written, &buf[..written.min(16)]);
        Ok(())
    }

    /// Hand a report obtained elsewhere to the registered handler
    pub fn propagate_report(&self, buf: &[u8]) -> Result<()> {
        self.shared.propagate(buf)
    }

    /// Stop the listener and release the descriptor
    pub fn close(self) {
        drop(self);
    }
}

impl<D: HidrawIo + 'static> HidrawDevice<D> {
    /// Start the background listener.
    ///
    /// # Panics
    /// If the listener is already running.
    pub fn start_events(&mut self) -> Result<()> {
        self.listener.start(
            Arc::clone(&self.shared),
            &self.config.thread_name,
            self.config.error_backoff(),
        )?;
        debug!("hidraw listener running as {}", self.config.thread_name);
        Ok(())
    }
}

impl<D: HidrawIo> Drop for HidrawDevice<D> {
    fn drop(&mut self) {
        // Joins the listener before the descriptor and pipe go away
        self.stop_events();
    }
}
