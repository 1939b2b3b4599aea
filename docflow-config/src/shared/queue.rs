use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::shared::ValidationError;

/// Configuration of the queue adapters wrapping stage channels.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct QueueConfig {
    /// Bound, in milliseconds, used by the zero-argument poll of an input queue.
    ///
    /// Consumers loop on this bound so that they can re-check external stop conditions instead of
    /// blocking forever on an empty channel.
    #[serde(default = "default_poll_timeout_ms")]
    pub poll_timeout_ms: u64,
    /// Capacity of local channels. A `put` suspends while the channel is full.
    #[serde(default = "default_capacity")]
    pub capacity: usize,
}

impl QueueConfig {
    /// Default poll bound: 120 seconds.
    pub const DEFAULT_POLL_TIMEOUT_MS: u64 = 120_000;

    /// Default local channel capacity.
    pub const DEFAULT_CAPACITY: usize = 10_000;

    /// Returns the default poll bound as a [`Duration`].
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    /// Validates the queue configuration.
    ///
    /// A zero capacity would make every `put` suspend forever.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.capacity == 0 {
            return Err(ValidationError::invalid(
                "queue.capacity",
                "must be greater than 0",
            ));
        }

        Ok(())
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            poll_timeout_ms: default_poll_timeout_ms(),
            capacity: default_capacity(),
        }
    }
}

fn default_poll_timeout_ms() -> u64 {
    QueueConfig::DEFAULT_POLL_TIMEOUT_MS
}

fn default_capacity() -> usize {
    QueueConfig::DEFAULT_CAPACITY
}
