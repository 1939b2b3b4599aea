use async_trait::async_trait;
use bytes::Bytes;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use crate::cluster::backend::SharedQueue;
use crate::concurrency::channel::{Channel, ChannelRef};
use crate::docflow_error;
use crate::error::{DocflowResult, ErrorKind};

/// Typed channel over a cluster-shared queue.
///
/// Elements are encoded as JSON. Every process opening a channel with the same name talks to the
/// same queue, so puts from one process can be polled by another. Delivery is at-least-once with
/// possible loss when a member fails; completion must be tracked through latches.
pub struct ClusterChannel<T> {
    queue: Arc<dyn SharedQueue>,
    _element: PhantomData<fn() -> T>,
}

impl<T> ClusterChannel<T>
where
    T: Serialize + DeserializeOwned + Send + 'static,
{
    pub fn new(queue: Arc<dyn SharedQueue>) -> Self {
        Self {
            queue,
            _element: PhantomData,
        }
    }

    /// Returns this channel as a shared trait object.
    pub fn into_ref(self) -> ChannelRef<T> {
        Arc::new(self)
    }

    /// Number of elements currently queued in the cluster.
    pub async fn len(&self) -> DocflowResult<usize> {
        self.queue.len().await
    }
}

impl<T> Clone for ClusterChannel<T> {
    fn clone(&self) -> Self {
        Self {
            queue: self.queue.clone(),
            _element: PhantomData,
        }
    }
}

impl<T> fmt::Debug for ClusterChannel<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClusterChannel")
            .field("queue", &self.queue.name())
            .finish()
    }
}

#[async_trait]
impl<T> Channel<T> for ClusterChannel<T>
where
    T: Serialize + DeserializeOwned + Send + 'static,
{
    fn name(&self) -> &str {
        self.queue.name()
    }

    async fn put(&self, item: T) -> DocflowResult<()> {
        let encoded = serde_json::to_vec(&item).map_err(|err| {
            docflow_error!(
                ErrorKind::SerializationError,
                "Failed to encode element for a cluster channel",
                self.queue.name(),
                source: err
            )
        })?;

        self.queue.offer(Bytes::from(encoded)).await
    }

    async fn poll(&self, timeout: Duration) -> DocflowResult<Option<T>> {
        let Some(payload) = self.queue.poll(timeout).await? else {
            return Ok(None);
        };

        let item = serde_json::from_slice(&payload)?;
        Ok(Some(item))
    }
}
