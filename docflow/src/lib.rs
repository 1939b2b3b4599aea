//! Coordination core for multi-stage document-processing pipelines.
//!
//! Stages run as tokio tasks inside one process or as separate worker processes sharing a
//! coordination backend. This crate provides what they need to agree on when work is done:
//!
//! - [`concurrency::signal::Latch`]: one-shot and counting completion signals.
//! - [`queue`]: producer and consumer adapters pairing channels with completion latches.
//! - [`workers::fan_out::FanOutStage`]: replicates a stream to a growable set of destinations.
//! - [`workers::bridge::CompletionBridge`]: forwards completion between a local latch and a
//!   cluster-wide countdown.
//! - [`cluster::coordinator::Coordinator`]: named cluster channels and latches plus a membership
//!   handshake, on top of a pluggable [`cluster::backend::CoordinationBackend`].
//!
//! # Example
//!
//! ```rust,no_run
//! use docflow::concurrency::channel::{Channel, LocalChannel};
//! use docflow::concurrency::shutdown::create_shutdown_channel;
//! use docflow::concurrency::signal::Latch;
//! use docflow::queue::InputQueue;
//! use docflow::workers::{FanOutStage, NoMoreOutput, StageOutcome};
//! use docflow_config::shared::QueueConfig;
//!
//! # async fn example() -> docflow::error::DocflowResult<()> {
//! let (_shutdown_tx, shutdown_rx) = create_shutdown_channel();
//! let config = QueueConfig::default();
//!
//! let scanned = LocalChannel::new("scan-output", config.capacity);
//! let scan_done = Latch::one_shot();
//! let input = InputQueue::new(scanned.clone().into_ref(), scan_done.clone(), &config, shutdown_rx.clone());
//!
//! let stage = FanOutStage::new("fan-out", input, shutdown_rx);
//! stage.add_output(LocalChannel::new("parse-input", config.capacity).into_ref());
//! stage.add_output(LocalChannel::new("index-input", config.capacity).into_ref());
//! let stage_done = stage.no_more_output().clone();
//!
//! scanned.put("/a".to_string()).await?;
//! scan_done.signal();
//!
//! assert_eq!(stage.run().await, StageOutcome::Success);
//! assert!(stage_done.is_signalled());
//! # Ok(())
//! # }
//! ```

pub mod cluster;
pub mod concurrency;
pub mod error;
pub mod failpoints;
mod macros;
pub mod metrics;
pub mod queue;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod workers;
