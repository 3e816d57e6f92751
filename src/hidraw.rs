// SPDX-License-Identifier: GPL-3.0
//! Raw hidraw descriptor access
//!
//! `HidrawIo` is the seam between the locking layer and the kernel: the
//! handle only needs something it can `poll(2)` plus four report primitives.
//! `HidrawNode` implements it for a real `/dev/hidrawN` node.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::os::fd::{AsFd, AsRawFd, BorrowedFd};
use std::path::{Path, PathBuf};

use tracing::{debug, error};

use crate::error::{HidrawError, Result};
use crate::types::{BusType, DeviceInfo};

/// Report-level access to an open hidraw descriptor
pub trait HidrawIo: AsFd + Send + Sync {
    /// One `read(2)`: a single input report, report ID included if numbered
    fn read_report(&self, buf: &mut [u8]) -> io::Result<usize>;

    /// One `write(2)`: a single output report
    fn write_report(&self, buf: &[u8]) -> io::Result<usize>;

    /// `HIDIOCGFEATURE(buf.len())`; `buf[0]` selects the report number
    fn get_feature(&self, buf: &mut [u8]) -> io::Result<usize>;

    /// `HIDIOCSFEATURE(buf.len())`; `buf[0]` selects the report number
    fn set_feature(&self, buf: &mut [u8]) -> io::Result<usize>;
}

// struct hidraw_devinfo from linux/hidraw.h
#[repr(C)]
#[derive(Debug, Default)]
struct RawDevinfo {
    bustype: u32,
    vendor: i16,
    product: i16,
}

mod ioctl {
    use super::RawDevinfo;

    nix::ioctl_read!(hidiocgrawinfo, b'H', 0x03, RawDevinfo);
    nix::ioctl_readwrite_buf!(hidiocsfeature, b'H', 0x06, u8);
    nix::ioctl_readwrite_buf!(hidiocgfeature, b'H', 0x07, u8);
}

/// An open `/dev/hidrawN` node
#[derive(Debug)]
pub struct HidrawNode {
    file: File,
    path: PathBuf,
}

impl HidrawNode {
    /// Open a hidraw node read-write and make sure it answers
    /// `HIDIOCGRAWINFO`, i.e. really is a hidraw device.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(HidrawError::InvalidArgument("no device node given".into()));
        }

        let file = OpenOptions::new().read(true).write(true).open(path)?;
        let node = Self {
            file,
            path: path.to_path_buf(),
        };

        let info = node.info().inspect_err(|e| {
            error!("Error while getting info from {}: {}", path.display(), e);
        })?;
        debug!("Opened {} ({})", path.display(), info);

        Ok(node)
    }

    /// Bus and USB identity of the node
    pub fn info(&self) -> Result<DeviceInfo> {
        let mut raw = RawDevinfo::default();
        // SAFETY: the descriptor is open for the lifetime of `self` and `raw`
        // matches the kernel's struct hidraw_devinfo layout.
        unsafe { ioctl::hidiocgrawinfo(self.file.as_raw_fd(), &mut raw) }?;
        Ok(DeviceInfo {
            bus: BusType::from(raw.bustype),
            vendor_id: raw.vendor as u16,
            product_id: raw.product as u16,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AsFd for HidrawNode {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.file.as_fd()
    }
}

impl HidrawIo for HidrawNode {
    fn read_report(&self, buf: &mut [u8]) -> io::Result<usize> {
        (&self.file).read(buf)
    }

    fn write_report(&self, buf: &[u8]) -> io::Result<usize> {
        (&self.file).write(buf)
    }

    fn get_feature(&self, buf: &mut [u8]) -> io::Result<usize> {
        // SAFETY: the ioctl size is taken from the slice length.
        let n = unsafe { ioctl::hidiocgfeature(self.file.as_raw_fd(), buf) }?;
        Ok(n as usize)
    }

    fn set_feature(&self, buf: &mut [u8]) -> io::Result<usize> {
        // SAFETY: the ioctl size is taken from the slice length.
        let n = unsafe { ioctl::hidiocsfeature(self.file.as_raw_fd(), buf) }?;
        Ok(n as usize)
    }
}
