use docflow_config::shared::BridgeConfig;
use metrics::counter;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{error, info, warn};

use crate::cluster::latch::ClusterLatch;
use crate::concurrency::shutdown::ShutdownRx;
use crate::concurrency::signal::Latch;
use crate::metrics::{DIRECTION_LABEL, DOCFLOW_BRIDGE_RUNS_TOTAL, OUTCOME_LABEL};
use crate::workers::base::{NoMoreOutput, StageOutcome, Worker};

/// Direction in which a [`CompletionBridge`] forwards completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeDirection {
    /// Counts the cluster latch down once the local latch is signalled.
    LocalToCluster,
    /// Signals the local latch once the cluster latch reaches zero.
    ClusterToLocal,
}

impl BridgeDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            BridgeDirection::LocalToCluster => "local_to_cluster",
            BridgeDirection::ClusterToLocal => "cluster_to_local",
        }
    }
}

impl fmt::Display for BridgeDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The two latches connected by a bridge, in forwarding order.
///
/// Built from a `(from, to)` pair, so that the direction follows from the argument order.
#[derive(Debug, Clone)]
pub enum BridgeBinding {
    LocalToCluster { local: Latch, cluster: ClusterLatch },
    ClusterToLocal { cluster: ClusterLatch, local: Latch },
}

impl BridgeBinding {
    pub fn direction(&self) -> BridgeDirection {
        match self {
            BridgeBinding::LocalToCluster { .. } => BridgeDirection::LocalToCluster,
            BridgeBinding::ClusterToLocal { .. } => BridgeDirection::ClusterToLocal,
        }
    }

    fn cluster(&self) -> &ClusterLatch {
        match self {
            BridgeBinding::LocalToCluster { cluster, .. }
            | BridgeBinding::ClusterToLocal { cluster, .. } => cluster,
        }
    }
}

impl From<(Latch, ClusterLatch)> for BridgeBinding {
    fn from((local, cluster): (Latch, ClusterLatch)) -> Self {
        BridgeBinding::LocalToCluster { local, cluster }
    }
}

impl From<(ClusterLatch, Latch)> for BridgeBinding {
    fn from((cluster, local): (ClusterLatch, Latch)) -> Self {
        BridgeBinding::ClusterToLocal { cluster, local }
    }
}

/// Forwards completion between a local latch and a cluster latch, in one direction.
///
/// Local to cluster, each cooperating process announces that its local stage is done by counting
/// the cluster latch down once. Cluster to local, a process learns that every peer is done and
/// unblocks local consumers. Both waits are bounded by [`BridgeConfig::timeout_ms`] and logged
/// every [`BridgeConfig::progress_interval_ms`], so a stalled bridge shows up in the logs.
///
/// A bridge runs exactly once and never fails across its boundary: timeouts, shutdown and
/// backend errors all end in [`StageOutcome::Failure`].
pub struct CompletionBridge {
    name: String,
    binding: BridgeBinding,
    config: BridgeConfig,
    shutdown: ShutdownRx,
}

impl CompletionBridge {
    /// Counts `cluster` down once `local` is signalled.
    pub fn local_to_cluster(
        local: Latch,
        cluster: ClusterLatch,
        config: &BridgeConfig,
        shutdown: ShutdownRx,
    ) -> Self {
        Self::between(local, cluster, config, shutdown)
    }

    /// Signals `local` once `cluster` reaches zero.
    pub fn cluster_to_local(
        cluster: ClusterLatch,
        local: Latch,
        config: &BridgeConfig,
        shutdown: ShutdownRx,
    ) -> Self {
        Self::between(cluster, local, config, shutdown)
    }

    /// Forwards completion from `from` to `to`; the direction follows from the argument types.
    pub fn between<F, T>(from: F, to: T, config: &BridgeConfig, shutdown: ShutdownRx) -> Self
    where
        (F, T): Into<BridgeBinding>,
    {
        let binding = (from, to).into();
        let name = format!("{}-{}", binding.direction(), binding.cluster().name());

        Self {
            name,
            binding,
            config: config.clone(),
            shutdown,
        }
    }

    /// Announces the completion of `stage` to the cluster.
    pub fn announce<S>(
        stage: &S,
        cluster: ClusterLatch,
        config: &BridgeConfig,
        shutdown: ShutdownRx,
    ) -> Self
    where
        S: NoMoreOutput + ?Sized,
    {
        Self::local_to_cluster(stage.no_more_output().clone(), cluster, config, shutdown)
    }

    /// Marks `stage` as done once the whole cluster is.
    pub fn release<S>(
        cluster: ClusterLatch,
        stage: &S,
        config: &BridgeConfig,
        shutdown: ShutdownRx,
    ) -> Self
    where
        S: NoMoreOutput + ?Sized,
    {
        Self::cluster_to_local(cluster, stage.no_more_output().clone(), config, shutdown)
    }

    pub fn direction(&self) -> BridgeDirection {
        self.binding.direction()
    }

    /// Runs the bridge to completion.
    pub async fn run(self) -> StageOutcome {
        let direction = self.direction();
        info!(bridge = %self.name, %direction, timeout = ?self.config.timeout(), "starting completion bridge");

        let outcome = match &self.binding {
            BridgeBinding::LocalToCluster { local, cluster } => {
                self.forward_to_cluster(local, cluster).await
            }
            BridgeBinding::ClusterToLocal { cluster, local } => {
                self.forward_to_local(cluster, local).await
            }
        };

        counter!(
            DOCFLOW_BRIDGE_RUNS_TOTAL,
            DIRECTION_LABEL => direction.as_str(),
            OUTCOME_LABEL => outcome.as_str()
        )
        .increment(1);
        info!(bridge = %self.name, %outcome, "completion bridge finished");

        outcome
    }

    async fn forward_to_cluster(&self, local: &Latch, cluster: &ClusterLatch) -> StageOutcome {
        let timeout = self.config.timeout();
        let start = Instant::now();

        loop {
            let round = self.next_round(start, timeout);
            if local.wait_for(round, &self.shutdown).await {
                break;
            }

            if self.shutdown.is_shutdown() {
                info!(bridge = %self.name, "completion bridge cancelled while waiting for local latch");
                return StageOutcome::Failure;
            }

            let elapsed = start.elapsed();
            if elapsed >= timeout {
                warn!(bridge = %self.name, ?elapsed, "timed out waiting for local latch");
                return StageOutcome::Failure;
            }

            info!(
                bridge = %self.name,
                remaining = local.remaining(),
                ?elapsed,
                "waiting for local latch"
            );
        }

        match cluster.count_down().await {
            Ok(()) => {
                info!(bridge = %self.name, cluster_latch = cluster.name(), "counted cluster latch down");
                StageOutcome::Success
            }
            Err(err) => {
                error!(bridge = %self.name, error = %err, "failed to count cluster latch down");
                StageOutcome::Failure
            }
        }
    }

    async fn forward_to_local(&self, cluster: &ClusterLatch, local: &Latch) -> StageOutcome {
        let timeout = self.config.timeout();
        let start = Instant::now();

        loop {
            let round = self.next_round(start, timeout);
            let reached = tokio::select! {
                biased;

                _ = self.shutdown.cancelled() => {
                    info!(bridge = %self.name, "completion bridge cancelled while waiting for cluster latch");
                    return StageOutcome::Failure;
                }
                reached = cluster.wait_zero(round) => reached,
            };

            match reached {
                Ok(true) => break,
                Ok(false) => {}
                Err(err) => {
                    error!(bridge = %self.name, error = %err, "failed to wait for cluster latch");
                    return StageOutcome::Failure;
                }
            }

            let elapsed = start.elapsed();
            if elapsed >= timeout {
                warn!(bridge = %self.name, ?elapsed, "timed out waiting for cluster latch");
                return StageOutcome::Failure;
            }

            match cluster.count().await {
                Ok(count) => {
                    info!(bridge = %self.name, count, ?elapsed, "waiting for cluster latch");
                }
                Err(err) => {
                    warn!(bridge = %self.name, error = %err, "failed to read cluster latch count");
                }
            }
        }

        local.signal();
        info!(bridge = %self.name, "signalled local latch");

        StageOutcome::Success
    }

    /// Length of the next wait: one progress interval, capped by what is left of the timeout.
    fn next_round(&self, start: Instant, timeout: Duration) -> Duration {
        let remaining = timeout.saturating_sub(start.elapsed());
        self.config.progress_interval().min(remaining)
    }
}

impl Worker for CompletionBridge {
    fn name(&self) -> &str {
        &self.name
    }

    fn run(self) -> impl Future<Output = StageOutcome> + Send {
        CompletionBridge::run(self)
    }
}

impl fmt::Debug for CompletionBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompletionBridge")
            .field("name", &self.name)
            .field("binding", &self.binding)
            .field("config", &self.config)
            .finish()
    }
}
