//! Input report propagation
//!
//! Every input report pulled off the device, whether by the listener thread
//! or by a foreground `read_input_report` with propagation requested, is
//! handed to the single registered [`EventHandler`] exactly once. The handler
//! runs synchronously on the thread that performed the read.

use std::time::Instant;

use tokio::sync::broadcast;
use tracing::trace;

use crate::error::Result;

/// Receiver for raw input reports.
///
/// Handlers called from the listener run while the listener owns the read
/// path, so they must not take the events lock of the same device
/// (`lock_events`, `raw_request`); doing so deadlocks the listener.
pub trait EventHandler: Send + Sync {
    fn raw_event(&self, report: &[u8]) -> Result<()>;
}

impl<F> EventHandler for F
where
    F: Fn(&[u8]) + Send + Sync,
{
    fn raw_event(&self, report: &[u8]) -> Result<()> {
        self(report);
        Ok(())
    }
}

/// Broadcast channel capacity for input reports
const REPORT_CHANNEL_CAPACITY: usize = 256;

/// An input report with its arrival time
#[derive(Debug, Clone, PartialEq)]
pub struct TimestampedReport {
    /// Seconds since the broadcaster was created
    pub timestamp: f64,
    pub data: Vec<u8>,
}

/// Fans input reports out to any number of (async) subscribers
pub struct ReportBroadcaster {
    tx: broadcast::Sender<TimestampedReport>,
    start_time: Instant,
}

impl ReportBroadcaster {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(REPORT_CHANNEL_CAPACITY);
        Self {
            tx,
            start_time: Instant::now(),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TimestampedReport> {
        self.tx.subscribe()
    }
}

impl Default for ReportBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl EventHandler for ReportBroadcaster {
    fn raw_event(&self, report: &[u8]) -> Result<()> {
        let timestamp = self.start_time.elapsed().as_secs_f64();
        trace!("Broadcasting {} byte report at {:.3}s", report.len(), timestamp);
        // No subscribers is not an error
        let _ = self.tx.send(TimestampedReport {
            timestamp,
            data: report.to_vec(),
        });
        Ok(())
    }
}
