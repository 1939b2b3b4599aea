use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::shared::ValidationError;

/// Configuration of completion bridges between local latches and cluster countdowns.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct BridgeConfig {
    /// Upper bound, in milliseconds, on the wait performed by a bridge.
    ///
    /// The default is a long fallback bound rather than an unbounded wait.
    ///
    /// Default: 604800000 (7 days)
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Interval, in milliseconds, between two progress log lines of a waiting bridge.
    ///
    /// Default: 60000 (60 seconds)
    #[serde(default = "default_progress_interval_ms")]
    pub progress_interval_ms: u64,
}

impl BridgeConfig {
    /// Default bridge timeout: 7 days.
    pub const DEFAULT_TIMEOUT_MS: u64 = 7 * 24 * 60 * 60 * 1_000;

    /// Default progress interval: 60 seconds.
    pub const DEFAULT_PROGRESS_INTERVAL_MS: u64 = 60_000;

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }

    /// Validates the bridge configuration.
    ///
    /// Ensures progress_interval_ms is non-zero, since it drives the polling loop.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.progress_interval_ms == 0 {
            return Err(ValidationError::invalid(
                "bridge.progress_interval_ms",
                "must be greater than 0",
            ));
        }

        Ok(())
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            progress_interval_ms: default_progress_interval_ms(),
        }
    }
}

fn default_timeout_ms() -> u64 {
    BridgeConfig::DEFAULT_TIMEOUT_MS
}

fn default_progress_interval_ms() -> u64 {
    BridgeConfig::DEFAULT_PROGRESS_INTERVAL_MS
}
