use serde::{Deserialize, Serialize};

use crate::load::Config;
use crate::shared::{BridgeConfig, ClusterConfig, QueueConfig, ValidationError};

/// Top-level configuration of a process taking part in a docflow pipeline.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct CoordinationConfig {
    /// Cluster attachment and membership handshake settings.
    #[serde(default)]
    pub cluster: ClusterConfig,
    /// Queue adapter settings.
    #[serde(default)]
    pub queue: QueueConfig,
    /// Completion bridge settings.
    #[serde(default)]
    pub bridge: BridgeConfig,
}

impl CoordinationConfig {
    /// Validates every nested section.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.cluster.validate()?;
        self.queue.validate()?;
        self.bridge.validate()?;

        Ok(())
    }
}

impl Config for CoordinationConfig {
    const LIST_PARSE_KEYS: &'static [&'static str] = &[];
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::ClusterMode;

    #[test]
    fn empty_document_uses_defaults() {
        let config: CoordinationConfig = serde_json::from_str("{}").unwrap();

        assert_eq!(config, CoordinationConfig::default());
        assert_eq!(config.queue.poll_timeout_ms, 120_000);
        assert_eq!(config.bridge.timeout_ms, 604_800_000);
        assert_eq!(config.cluster.member_poll_interval_ms, 1_000);
        assert_eq!(config.cluster.mode, ClusterMode::Member);
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let config: CoordinationConfig = serde_json::from_str(
            r#"{"cluster": {"mode": "client"}, "queue": {"capacity": 16}}"#,
        )
        .unwrap();

        assert_eq!(config.cluster.mode, ClusterMode::Client);
        assert_eq!(
            config.cluster.member_join_timeout_ms,
            ClusterConfig::DEFAULT_MEMBER_JOIN_TIMEOUT_MS
        );
        assert_eq!(config.queue.capacity, 16);
        assert_eq!(config.queue.poll_timeout_ms, QueueConfig::DEFAULT_POLL_TIMEOUT_MS);
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let mut config = CoordinationConfig::default();
        config.queue.capacity = 0;

        let err = config.validate().unwrap_err();
        assert_eq!(
            err,
            ValidationError::InvalidFieldValue {
                field: "queue.capacity".to_string(),
                constraint: "must be greater than 0".to_string(),
            }
        );
    }

    #[test]
    fn zero_poll_interval_is_rejected() {
        let mut config = CoordinationConfig::default();
        config.cluster.member_poll_interval_ms = 0;

        assert!(config.validate().is_err());
    }
}
