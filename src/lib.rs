//! Thread-safe access to Linux hidraw nodes
//!
//! A single hidraw descriptor is shared between a background listener that
//! drains unsolicited input reports and foreground callers doing
//! request/response exchanges (feature get/set). The two never read the
//! device at the same time:
//!
//! - the listener reads in short, bounded cycles under a read lock
//! - a foreground caller steals the lock through an interrupt pipe, so it
//!   does not have to wait out the listener's poll
//! - every input report, from either side, is handed to one registered
//!   [`EventHandler`]
//!
//! ```no_run
//! use hidraw_core::{HidrawConfig, HidrawDevice};
//!
//! # fn main() -> hidraw_core::Result<()> {
//! let mut dev = HidrawDevice::open("/dev/hidraw0", HidrawConfig::default())?;
//! dev.set_event_handler(|report: &[u8]| println!("input: {report:02x?}"));
//! dev.start_events()?;
//!
//! let mut reply = [0u8; 20];
//! let len = dev.get_feature_report(0x11, &mut reply)?;
//! println!("feature 0x11: {:02x?}", &reply[..len]);
//!
//! dev.close();
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod event;
pub mod hidraw;
pub mod types;

mod device;
mod listener;
mod soft_lock;

pub use config::HidrawConfig;
pub use device::HidrawDevice;
pub use error::{HidrawError, Result};
pub use event::{EventHandler, ReportBroadcaster, TimestampedReport};
pub use hidraw::{HidrawIo, HidrawNode};
pub use soft_lock::EventsLock;
pub use types::{
    BusType, DeviceInfo, ReportKind, RequestType, HIDRAW_MAX_READ, HID_MAX_BUFFER_SIZE,
};
