//! Runnable pipeline stages and the pool executing them.

pub mod base;
pub mod bridge;
pub mod fan_out;
pub mod pool;

pub use base::{NoMoreOutput, StageOutcome, Worker};
pub use bridge::CompletionBridge;
pub use fan_out::FanOutStage;
pub use pool::WorkerPool;
