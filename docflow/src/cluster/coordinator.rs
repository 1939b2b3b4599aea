use docflow_config::shared::{ClusterConfig, ClusterMode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::bail;
use crate::cluster::backend::{Connector, CoordinationBackend, Member, ROLE_ATTRIBUTE};
use crate::cluster::channel::ClusterChannel;
use crate::cluster::latch::ClusterLatch;
use crate::concurrency::shutdown::ShutdownRx;
use crate::docflow_error;
use crate::error::{DocflowResult, ErrorKind};

/// Entry point of a process into the cluster.
///
/// A [`Coordinator`] is constructed once per process, passed by reference to whatever needs
/// cluster resources and released with [`Coordinator::shutdown`]. Its mode is fixed at
/// construction.
#[derive(Debug)]
pub struct Coordinator {
    backend: Arc<dyn CoordinationBackend>,
    config: ClusterConfig,
}

impl Coordinator {
    /// Connects to the cluster through `connector`.
    ///
    /// Failing to reach the backend is fatal and reported as
    /// [`ErrorKind::BackendUnavailable`]: a process without a cluster connection could never
    /// agree with its peers on global completion.
    pub async fn connect<C>(config: &ClusterConfig, connector: &C) -> DocflowResult<Self>
    where
        C: Connector + ?Sized,
    {
        config.validate()?;

        let backend = match connector.connect(config.mode).await {
            Ok(backend) => backend,
            Err(err) => {
                error!(mode = %config.mode, error = %err, "failed to connect to the coordination backend");

                if err.kind() == ErrorKind::BackendUnavailable {
                    return Err(err);
                }

                return Err(docflow_error!(
                    ErrorKind::BackendUnavailable,
                    "Failed to connect to the coordination backend",
                    detail = err.to_string(),
                    source: err
                ));
            }
        };

        info!(backend = backend.name(), mode = %config.mode, "connected to cluster");

        Ok(Self {
            backend,
            config: config.clone(),
        })
    }

    pub fn mode(&self) -> ClusterMode {
        self.config.mode
    }

    /// Opens the cluster channel called `name`.
    pub async fn channel<T>(&self, name: &str) -> DocflowResult<ClusterChannel<T>>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
    {
        let queue = self.backend.queue(name).await?;
        Ok(ClusterChannel::new(queue))
    }

    /// Opens the cluster countdown signal called `name`, without setting its count.
    pub async fn cluster_latch(&self, name: &str) -> DocflowResult<ClusterLatch> {
        let count_down = self.backend.count_down_latch(name).await?;
        Ok(ClusterLatch::new(count_down))
    }

    /// Opens the cluster countdown signal called `name` and sets its count unless a peer already
    /// did.
    pub async fn cluster_latch_with_count(
        &self,
        name: &str,
        count: u64,
    ) -> DocflowResult<ClusterLatch> {
        let latch = self.cluster_latch(name).await?;
        let set = latch.try_set_count(count).await?;

        debug!(latch = name, count, set, "initialized cluster latch");

        Ok(latch)
    }

    pub async fn members(&self) -> DocflowResult<Vec<Member>> {
        self.backend.members().await
    }

    /// Advertises `role` to the other members.
    ///
    /// Returns [`ErrorKind::InvalidState`] in client mode, since clients are not members.
    pub async fn set_local_member_role(&self, role: &str) -> DocflowResult<()> {
        if self.config.mode == ClusterMode::Client {
            bail!(
                ErrorKind::InvalidState,
                "Cannot advertise a role from a cluster client",
                format!("attempted to advertise role '{role}'")
            );
        }

        self.backend.set_local_attribute(ROLE_ATTRIBUTE, role).await?;
        info!(role, "advertised local member role");

        Ok(())
    }

    /// Waits until a remote member advertises `role`.
    ///
    /// Membership is checked every configured poll interval. Returns `true` as soon as a member
    /// other than this process advertises the role, and `false` once `timeout` has elapsed or
    /// on shutdown. Membership errors are logged and retried on the next check.
    pub async fn await_member_joins(
        &self,
        role: &str,
        timeout: Duration,
        shutdown: &ShutdownRx,
    ) -> bool {
        let poll_interval = self.config.member_poll_interval();
        let start = Instant::now();

        loop {
            match self.members().await {
                Ok(members) => {
                    let joined = members
                        .iter()
                        .filter(|member| !member.local)
                        .any(|member| member.role() == Some(role));

                    if joined {
                        info!(role, elapsed = ?start.elapsed(), "member with awaited role joined");
                        return true;
                    }
                }
                Err(err) => {
                    warn!(role, error = %err, "failed to list cluster members");
                }
            }

            let elapsed = start.elapsed();
            if elapsed >= timeout {
                info!(role, ?timeout, "timed out waiting for member to join");
                return false;
            }

            let pause = poll_interval.min(timeout - elapsed);
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    info!(role, "stopped waiting for member to join due to shutdown");
                    return false;
                }
                _ = tokio::time::sleep(pause) => {}
            }
        }
    }

    /// Waits for `role` using the configured default join timeout.
    pub async fn await_member_joins_default(&self, role: &str, shutdown: &ShutdownRx) -> bool {
        self.await_member_joins(role, self.config.member_join_timeout(), shutdown)
            .await
    }

    /// Leaves the cluster and releases the connection.
    pub async fn shutdown(self) -> DocflowResult<()> {
        self.backend.shutdown().await?;
        info!(backend = self.backend.name(), "left cluster");

        Ok(())
    }
}
