//! Read-ownership handoff between the listener thread and foreground callers
//!
//! Only one thread may sit in `poll`/`read`/`ioctl` on the device at a time.
//! The listener holds `read_lock` for each bounded read. A foreground caller
//! that wants the device steals it:
//!
//! ```text
//! stealer                               listener
//! -------                               --------
//! lock(grab_lock)                       holds read_lock, blocked in poll()
//! write(pipe, 1 byte)       ───────────▶ poll() wakes on the pipe,
//!                                        drains it, returns Interrupted
//! lock(read_lock)           ◀─────────── unlock(read_lock)
//! drain(pipe)                            lock(grab_lock)   (blocks)
//! unlock(grab_lock)         ───────────▶ unlock(grab_lock)
//! ... exclusive device I/O ...           lock(read_lock)   (blocks)
//! unlock(read_lock)         ───────────▶ next cycle
//! ```
//!
//! `grab_lock` only serializes the announcement. Because the listener passes
//! through it after every cycle, it cannot re-take `read_lock` until the
//! stealer has it.

use std::fs::File;
use std::io::{self, Read, Write};
use std::os::fd::{AsFd, BorrowedFd};

use nix::fcntl::OFlag;
use parking_lot::{Mutex, MutexGuard};
use tracing::{trace, warn};

/// Self-pipe used to kick a blocked `poll()`; never visible to the device
struct InterruptPipe {
    rx: File,
    tx: File,
}

impl InterruptPipe {
    fn new() -> io::Result<Self> {
        let (rx, tx) = nix::unistd::pipe2(OFlag::O_CLOEXEC | OFlag::O_NONBLOCK)?;
        Ok(Self {
            rx: File::from(rx),
            tx: File::from(tx),
        })
    }

    fn notify(&self) {
        match (&self.tx).write(b"\n") {
            Ok(_) => {}
            // A full pipe already guarantees a wakeup
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
            Err(e) => warn!("Failed to signal hidraw interrupt pipe: {}", e),
        }
    }

    fn drain(&self) -> usize {
        let mut buf = [0u8; 64];
        let mut total = 0;
        loop {
            match (&self.rx).read(&mut buf) {
                Ok(0) => break,
                Ok(n) => total += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(_) => break,
            }
        }
        total
    }
}

/// The two mutexes and the interrupt pipe guarding one device's read path
pub(crate) struct SoftLock {
    read_lock: Mutex<()>,
    grab_lock: Mutex<()>,
    pipe: InterruptPipe,
}

impl SoftLock {
    pub(crate) fn new() -> io::Result<Self> {
        Ok(Self {
            read_lock: Mutex::new(()),
            grab_lock: Mutex::new(()),
            pipe: InterruptPipe::new()?,
        })
    }

    /// Take the read path away from the listener without waiting out its poll
    pub(crate) fn steal(&self) -> MutexGuard<'_, ()> {
        let grab = self.grab_lock.lock();
        self.pipe.notify();
        let guard = self.read_lock.lock();
        // A listener that was between cycles never saw the byte; clear it so
        // our own reads are not interrupted. Still under grab_lock, so no
        // other stealer's byte can be lost here.
        let stale = self.pipe.drain();
        if stale > 0 {
            trace!("Cleared {} stale interrupt byte(s)", stale);
        }
        drop(grab);
        guard
    }

    /// Listener side: plain acquisition of the read path
    pub(crate) fn acquire(&self) -> MutexGuard<'_, ()> {
        self.read_lock.lock()
    }

    /// Listener side: let a pending stealer finish taking `read_lock`
    pub(crate) fn yield_to_stealer(&self) {
        drop(self.grab_lock.lock());
    }

    /// Wake whoever is polling, without taking any lock
    pub(crate) fn interrupt(&self) {
        self.pipe.notify();
    }

    /// Consume pending interrupt bytes, returning how many there were
    pub(crate) fn drain_interrupts(&self) -> usize {
        self.pipe.drain()
    }

    pub(crate) fn interrupt_fd(&self) -> BorrowedFd<'_> {
        self.pipe.rx.as_fd()
    }
}

/// Exclusive read ownership of a device, released on drop.
///
/// Returned by [`HidrawDevice::lock_events`](crate::HidrawDevice::lock_events)
/// and required by [`HidrawDevice::read_input_report`](crate::HidrawDevice::read_input_report).
/// When no listener is running the lock is free and holds nothing.
#[must_use = "the events lock is released as soon as it is dropped"]
pub struct EventsLock<'a> {
    owner: &'a SoftLock,
    guard: Option<MutexGuard<'a, ()>>,
}

impl<'a> EventsLock<'a> {
    pub(crate) fn uncontended(owner: &'a SoftLock) -> Self {
        Self { owner, guard: None }
    }

    pub(crate) fn stolen(owner: &'a SoftLock) -> Self {
        Self {
            owner,
            guard: Some(owner.steal()),
        }
    }

    /// Whether this lock actually excludes a running listener
    pub fn is_exclusive(&self) -> bool {
        self.guard.is_some()
    }

    /// Whether this lock was taken on `lock`
    pub(crate) fn guards(&self, lock: &SoftLock) -> bool {
        std::ptr::eq(self.owner, lock)
    }
}
