//! Shared configuration types for docflow pipelines.

mod base;
mod bridge;
mod cluster;
mod coordination;
mod queue;

pub use base::ValidationError;
pub use bridge::BridgeConfig;
pub use cluster::{ClusterConfig, ClusterMode};
pub use coordination::CoordinationConfig;
pub use queue::QueueConfig;
