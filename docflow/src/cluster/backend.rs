//! Minimal capability interface of a distributed coordination backend.
//!
//! The coordination core never depends on a backend product. Anything able to provide named
//! queues, named countdown signals and a membership directory with per-member attributes can
//! back a cluster. Elements cross process boundaries as opaque [`Bytes`]; typing is layered on
//! top by [`crate::cluster::channel::ClusterChannel`].
//!
//! Delivery guarantees are deliberately weak: shared queues are at-least-once with possible
//! loss when a member fails. Consumers must detect completion through countdown signals and
//! latches, never by counting elements.

use async_trait::async_trait;
use bytes::Bytes;
use docflow_config::shared::ClusterMode;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::error::DocflowResult;

/// Attribute key under which a member advertises its role.
pub const ROLE_ATTRIBUTE: &str = "role";

/// A process taking part in the cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    /// Identifier assigned when the member joined.
    pub id: Uuid,
    /// Whether this member is the calling process.
    pub local: bool,
    /// Attributes advertised by the member.
    pub attributes: HashMap<String, String>,
}

impl Member {
    /// Returns the role advertised by this member, if any.
    pub fn role(&self) -> Option<&str> {
        self.attributes.get(ROLE_ATTRIBUTE).map(String::as_str)
    }
}

/// Establishes a backend connection in the requested mode.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Connects to the backend.
    ///
    /// Must fail with [`crate::error::ErrorKind::BackendUnavailable`] when no connection can be
    /// established.
    async fn connect(&self, mode: ClusterMode) -> DocflowResult<Arc<dyn CoordinationBackend>>;
}

/// Connection to a coordination backend, as seen by one process.
#[async_trait]
pub trait CoordinationBackend: fmt::Debug + Send + Sync {
    /// Name of the backend implementation, used in logs.
    fn name(&self) -> &'static str;

    /// Gets or creates the queue called `name`.
    async fn queue(&self, name: &str) -> DocflowResult<Arc<dyn SharedQueue>>;

    /// Gets or creates the countdown signal called `name`.
    async fn count_down_latch(&self, name: &str) -> DocflowResult<Arc<dyn SharedCountDown>>;

    /// Lists the current members of the cluster.
    async fn members(&self) -> DocflowResult<Vec<Member>>;

    /// Sets an attribute of the local member.
    async fn set_local_attribute(&self, key: &str, value: &str) -> DocflowResult<()>;

    /// Leaves the cluster and releases the connection.
    async fn shutdown(&self) -> DocflowResult<()>;
}

/// Queue shared by every process using the same name.
#[async_trait]
pub trait SharedQueue: fmt::Debug + Send + Sync {
    fn name(&self) -> &str;

    /// Appends an element.
    async fn offer(&self, item: Bytes) -> DocflowResult<()>;

    /// Removes the head element, waiting at most `timeout`. Must be cancel safe.
    async fn poll(&self, timeout: Duration) -> DocflowResult<Option<Bytes>>;

    /// Number of elements currently queued.
    async fn len(&self) -> DocflowResult<usize>;
}

/// Countdown signal shared by every process using the same name.
///
/// The count only ever decreases once set, and stays at zero once it gets there.
#[async_trait]
pub trait SharedCountDown: fmt::Debug + Send + Sync {
    fn name(&self) -> &str;

    /// Current count.
    async fn count(&self) -> DocflowResult<u64>;

    /// Sets the initial count.
    ///
    /// Returns `false` without changing anything if the count was already set, so that
    /// concurrent initializers agree on a single value.
    async fn try_set_count(&self, count: u64) -> DocflowResult<bool>;

    /// Decrements the count by one. Has no effect at zero.
    async fn count_down(&self) -> DocflowResult<()>;

    /// Waits at most `timeout` for the count to reach zero and returns whether it did.
    async fn wait_zero(&self, timeout: Duration) -> DocflowResult<bool>;
}
