use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::cluster::backend::SharedCountDown;
use crate::error::DocflowResult;

/// Cluster-wide countdown signal addressed by name.
///
/// The count is set once by whichever process gets there first, only ever decreases afterwards
/// and stays at zero once it reaches it. Pipeline stages never see this type directly: a
/// [`crate::workers::bridge::CompletionBridge`] translates it to and from a local latch.
#[derive(Clone)]
pub struct ClusterLatch {
    count_down: Arc<dyn SharedCountDown>,
}

impl ClusterLatch {
    pub fn new(count_down: Arc<dyn SharedCountDown>) -> Self {
        Self { count_down }
    }

    pub fn name(&self) -> &str {
        self.count_down.name()
    }

    /// Current count, zero when the signal was never set.
    pub async fn count(&self) -> DocflowResult<u64> {
        self.count_down.count().await
    }

    /// Sets the initial count if nobody did before. Returns whether this call set it.
    pub async fn try_set_count(&self, count: u64) -> DocflowResult<bool> {
        self.count_down.try_set_count(count).await
    }

    /// Decrements the count by one.
    pub async fn count_down(&self) -> DocflowResult<()> {
        self.count_down.count_down().await
    }

    /// Waits at most `timeout` for the count to reach zero.
    pub async fn wait_zero(&self, timeout: Duration) -> DocflowResult<bool> {
        self.count_down.wait_zero(timeout).await
    }
}

impl fmt::Debug for ClusterLatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClusterLatch")
            .field("name", &self.name())
            .finish()
    }
}
