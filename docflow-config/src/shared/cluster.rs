use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::shared::ValidationError;

/// How a process attaches to the coordination backend.
///
/// The mode is chosen once, when the coordinator is constructed, and never changes afterwards.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum ClusterMode {
    /// Full participating member, visible to other processes through membership.
    #[default]
    Member,
    /// Lightweight client connecting to an existing cluster; it is not listed as a member.
    Client,
}

impl fmt::Display for ClusterMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClusterMode::Member => f.write_str("member"),
            ClusterMode::Client => f.write_str("client"),
        }
    }
}

/// Configuration of the cluster coordinator.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct ClusterConfig {
    /// Whether this process joins as a member or as a client.
    #[serde(default)]
    pub mode: ClusterMode,
    /// Interval in milliseconds between two membership checks while awaiting a peer.
    ///
    /// Default: 1000 (1 second)
    #[serde(default = "default_member_poll_interval_ms")]
    pub member_poll_interval_ms: u64,
    /// Default bound in milliseconds when awaiting a peer without an explicit timeout.
    ///
    /// Default: 3600000 (60 minutes)
    #[serde(default = "default_member_join_timeout_ms")]
    pub member_join_timeout_ms: u64,
}

impl ClusterConfig {
    /// Default membership poll interval: 1 second.
    pub const DEFAULT_MEMBER_POLL_INTERVAL_MS: u64 = 1_000;

    /// Default member join timeout: 60 minutes.
    pub const DEFAULT_MEMBER_JOIN_TIMEOUT_MS: u64 = 60 * 60 * 1_000;

    /// Returns a member-mode configuration with default intervals.
    pub fn member() -> Self {
        Self::default()
    }

    /// Returns a client-mode configuration with default intervals.
    pub fn client() -> Self {
        Self {
            mode: ClusterMode::Client,
            ..Self::default()
        }
    }

    pub fn member_poll_interval(&self) -> Duration {
        Duration::from_millis(self.member_poll_interval_ms)
    }

    pub fn member_join_timeout(&self) -> Duration {
        Duration::from_millis(self.member_join_timeout_ms)
    }

    /// Validates the cluster configuration.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.member_poll_interval_ms == 0 {
            return Err(ValidationError::invalid(
                "cluster.member_poll_interval_ms",
                "must be greater than 0",
            ));
        }

        Ok(())
    }
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            mode: ClusterMode::default(),
            member_poll_interval_ms: default_member_poll_interval_ms(),
            member_join_timeout_ms: default_member_join_timeout_ms(),
        }
    }
}

fn default_member_poll_interval_ms() -> u64 {
    ClusterConfig::DEFAULT_MEMBER_POLL_INTERVAL_MS
}

fn default_member_join_timeout_ms() -> u64 {
    ClusterConfig::DEFAULT_MEMBER_JOIN_TIMEOUT_MS
}
