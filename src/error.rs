//! Hidraw error types

use std::io;

use thiserror::Error;

use crate::types::ReportKind;

/// Errors that can occur while talking to a hidraw node
#[derive(Error, Debug)]
pub enum HidrawError {
    /// Bad length, missing device node or an events lock from another device
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Only feature reports can go through control requests
    #[error("Unsupported report kind: {0:?}")]
    Unsupported(ReportKind),

    /// Underlying open/ioctl/read/write/poll failure
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Nothing became readable within the poll timeout
    #[error("Timed out waiting for an input report")]
    Timeout,

    /// A lock steal preempted the read; retry once the lock is available
    #[error("Read interrupted by a pending lock request")]
    Interrupted,

    /// Pipe or lock setup failed after the device was opened
    #[error("Failed to initialize hidraw handle: {0}")]
    Init(#[source] io::Error),

    /// The device accepted fewer bytes than requested
    #[error("Incomplete write: {written} of {expected} bytes")]
    ShortWrite { written: usize, expected: usize },
}

impl From<nix::errno::Errno> for HidrawError {
    fn from(e: nix::errno::Errno) -> Self {
        HidrawError::Io(io::Error::from(e))
    }
}

impl HidrawError {
    /// Negative errno in the kernel convention, for callers that forward
    /// results across a C-style boundary.
    pub fn errno(&self) -> i32 {
        let code = match self {
            HidrawError::InvalidArgument(_) => libc::EINVAL,
            HidrawError::Unsupported(_) => libc::ENOTSUP,
            HidrawError::Io(e) | HidrawError::Init(e) => e.raw_os_error().unwrap_or(libc::EIO),
            HidrawError::Timeout => libc::ETIMEDOUT,
            HidrawError::Interrupted => libc::EINTR,
            HidrawError::ShortWrite { .. } => libc::EIO,
        };
        -code
    }

    /// Timeouts and interruptions are expected outcomes of a bounded read
    pub fn is_transient(&self) -> bool {
        matches!(self, HidrawError::Timeout | HidrawError::Interrupted)
    }

    pub(crate) fn invalid_len(len: usize, max: usize) -> Self {
        HidrawError::InvalidArgument(format!("report length {len} outside 1..={max}"))
    }
}

pub type Result<T, E = HidrawError> = std::result::Result<T, E>;
