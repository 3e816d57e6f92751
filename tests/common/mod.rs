//! Fake hidraw device shared by the integration tests.
//!
//! The device side is one end of a `UnixDatagram` pair, so `poll(2)` works on
//! it and datagram boundaries behave like hidraw report boundaries. The test
//! holds the other end (`Host`) to inject input reports and collect output
//! reports. Feature reports are served from an in-memory table.

#![allow(dead_code)]

use std::collections::HashMap;
use std::io;
use std::os::fd::{AsFd, BorrowedFd};
use std::os::unix::net::UnixDatagram;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use hidraw_core::{HidrawConfig, HidrawIo};

pub struct FakeHidraw {
    sock: UnixDatagram,
    features: Mutex<HashMap<u8, Vec<u8>>>,
    last_set: Mutex<Option<Vec<u8>>>,
    write_limit: AtomicUsize,
    access_delay: Duration,
    in_flight: AtomicUsize,
    pub overlaps: AtomicUsize,
    pub accesses: AtomicUsize,
    pub reads: AtomicUsize,
    dropped: Arc<AtomicBool>,
}

pub struct Host {
    sock: UnixDatagram,
    dropped: Arc<AtomicBool>,
}

/// Create a connected fake device and its host end
pub fn fake_device() -> (FakeHidraw, Host) {
    fake_device_with_delay(Duration::ZERO)
}

/// Like `fake_device`, but every device access lingers for `delay` so
/// overlapping accesses are easy to catch.
pub fn fake_device_with_delay(delay: Duration) -> (FakeHidraw, Host) {
    let (dev_sock, host_sock) = UnixDatagram::pair().expect("socketpair");
    let dropped = Arc::new(AtomicBool::new(false));
    let fake = FakeHidraw {
        sock: dev_sock,
        features: Mutex::new(HashMap::new()),
        last_set: Mutex::new(None),
        write_limit: AtomicUsize::new(0),
        access_delay: delay,
        in_flight: AtomicUsize::new(0),
        overlaps: AtomicUsize::new(0),
        accesses: AtomicUsize::new(0),
        reads: AtomicUsize::new(0),
        dropped: Arc::clone(&dropped),
    };
    let host = Host {
        sock: host_sock,
        dropped,
    };
    (fake, host)
}

pub fn test_config(poll_timeout_ms: u64) -> HidrawConfig {
    HidrawConfig {
        poll_timeout_ms,
        error_backoff_ms: 10,
        thread_name: "hidraw-test".into(),
    }
}

/// Poll `cond` until it holds or `timeout` passes
pub fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    cond()
}

struct AccessWindow<'a> {
    fake: &'a FakeHidraw,
}

impl Drop for AccessWindow<'_> {
    fn drop(&mut self) {
        self.fake.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

impl FakeHidraw {
    /// Serve `report` for GET_FEATURE on `report[0]`
    pub fn add_feature(&self, report: &[u8]) {
        self.features
            .lock()
            .unwrap()
            .insert(report[0], report.to_vec());
    }

    pub fn last_set(&self) -> Option<Vec<u8>> {
        self.last_set.lock().unwrap().clone()
    }

    /// Accept at most `limit` bytes per write (0 = unlimited)
    pub fn set_write_limit(&self, limit: usize) {
        self.write_limit.store(limit, Ordering::SeqCst);
    }

    fn enter(&self) -> AccessWindow<'_> {
        self.accesses.fetch_add(1, Ordering::SeqCst);
        if self.in_flight.fetch_add(1, Ordering::SeqCst) > 0 {
            self.overlaps.fetch_add(1, Ordering::SeqCst);
        }
        if !self.access_delay.is_zero() {
            std::thread::sleep(self.access_delay);
        }
        AccessWindow { fake: self }
    }
}

impl Drop for FakeHidraw {
    fn drop(&mut self) {
        self.dropped.store(true, Ordering::SeqCst);
    }
}

impl AsFd for FakeHidraw {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.sock.as_fd()
    }
}

impl HidrawIo for FakeHidraw {
    fn read_report(&self, buf: &mut [u8]) -> io::Result<usize> {
        let _window = self.enter();
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.sock.recv(buf)
    }

    fn write_report(&self, buf: &[u8]) -> io::Result<usize> {
        let limit = self.write_limit.load(Ordering::SeqCst);
        let len = if limit == 0 { buf.len() } else { buf.len().min(limit) };
        self.sock.send(&buf[..len])
    }

    fn get_feature(&self, buf: &mut [u8]) -> io::Result<usize> {
        let _window = self.enter();
        let features = self.features.lock().unwrap();
        let report = features
            .get(&buf[0])
            .ok_or_else(|| io::Error::from_raw_os_error(libc::EPIPE))?;
        let len = report.len().min(buf.len());
        buf[..len].copy_from_slice(&report[..len]);
        Ok(len)
    }

    fn set_feature(&self, buf: &mut [u8]) -> io::Result<usize> {
        let _window = self.enter();
        *self.last_set.lock().unwrap() = Some(buf.to_vec());
        Ok(buf.len())
    }
}

impl Host {
    /// Queue an input report for the device to read
    pub fn inject(&self, report: &[u8]) {
        self.sock.send(report).expect("inject report");
    }

    /// Receive the next output report written by the device
    pub fn recv_output(&self) -> Vec<u8> {
        self.sock
            .set_read_timeout(Some(Duration::from_secs(2)))
            .expect("set timeout");
        let mut buf = [0u8; 4096];
        let len = self.sock.recv(&mut buf).expect("output report");
        buf[..len].to_vec()
    }

    pub fn device_dropped(&self) -> bool {
        self.dropped.load(Ordering::SeqCst)
    }
}
