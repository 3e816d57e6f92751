//! Runtime configuration for hidraw handles
//!
//! Supports TOML so the owning driver can keep these knobs next to its own
//! settings. Every field has a default, so an empty file is valid.

use std::path::Path;
use std::time::Duration;

use nix::poll::PollTimeout;
use serde::{Deserialize, Serialize};

/// Default bound on a single input poll
pub const DEFAULT_POLL_TIMEOUT_MS: u64 = 1000;

/// Default listener pause after a hard read error
pub const DEFAULT_ERROR_BACKOFF_MS: u64 = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HidrawConfig {
    /// How long `read_input_report` waits for the device or an interrupt
    pub poll_timeout_ms: u64,
    /// Listener sleep after a read error, taken outside the soft lock
    pub error_backoff_ms: u64,
    /// Name given to the listener thread
    pub thread_name: String,
}

impl Default for HidrawConfig {
    fn default() -> Self {
        Self {
            poll_timeout_ms: DEFAULT_POLL_TIMEOUT_MS,
            error_backoff_ms: DEFAULT_ERROR_BACKOFF_MS,
            thread_name: "hidraw-events".into(),
        }
    }
}

impl HidrawConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }

    /// Load from a TOML file
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        use anyhow::Context;

        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::from_toml_str(&text)
            .with_context(|| format!("Failed to parse config {}", path.display()))
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    pub fn error_backoff(&self) -> Duration {
        Duration::from_millis(self.error_backoff_ms)
    }

    /// Poll timeout in the form `poll(2)` takes, clamped to its maximum
    pub(crate) fn poll_timeout_arg(&self) -> PollTimeout {
        PollTimeout::try_from(self.poll_timeout_ms).unwrap_or(PollTimeout::MAX)
    }
}
