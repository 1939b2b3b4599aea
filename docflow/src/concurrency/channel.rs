//! Typed FIFO channels connecting pipeline stages.
//!
//! A [`Channel`] offers a suspending `put` and a bounded `poll`. Stages only hold channels as
//! [`ChannelRef`] trait objects, so a destination can be a local in-process queue or a
//! cluster-shared queue without the stage noticing.

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{Mutex, mpsc};
use tokio::time::Instant;

use crate::docflow_error;
use crate::error::{DocflowError, DocflowResult, ErrorKind};

/// Shared handle to a channel carrying elements of type `T`.
pub type ChannelRef<T> = Arc<dyn Channel<T>>;

/// FIFO channel with a suspending put and a bounded-timeout poll.
///
/// Implementations must keep `poll` cancel safe: dropping a pending `poll` future must never
/// lose an element. Multi-source consumers race several polls and drop the losers.
#[async_trait]
pub trait Channel<T>: fmt::Debug + Send + Sync
where
    T: Send + 'static,
{
    /// Name used in logs and metrics.
    fn name(&self) -> &str;

    /// Enqueues `item`, suspending while the channel is at capacity.
    async fn put(&self, item: T) -> DocflowResult<()>;

    /// Dequeues the next element, waiting at most `timeout`.
    ///
    /// Returns `Ok(None)` when nothing arrived in time. A zero `timeout` still returns an
    /// element that is already present.
    async fn poll(&self, timeout: Duration) -> DocflowResult<Option<T>>;
}

/// Bounded in-process channel.
///
/// Clones share the same queue. Several consumers may poll concurrently; each element is
/// delivered to exactly one of them.
pub struct LocalChannel<T> {
    name: Arc<str>,
    tx: mpsc::Sender<T>,
    rx: Arc<Mutex<mpsc::Receiver<T>>>,
}

impl<T> LocalChannel<T>
where
    T: Send + 'static,
{
    /// Creates a channel holding at most `capacity` elements.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero, like [`mpsc::channel`].
    pub fn new(name: impl Into<Arc<str>>, capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity);
        Self {
            name: name.into(),
            tx,
            rx: Arc::new(Mutex::new(rx)),
        }
    }

    /// Returns this channel as a shared trait object.
    pub fn into_ref(self) -> ChannelRef<T> {
        Arc::new(self)
    }

    /// Number of elements currently queued.
    pub fn len(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Clone for LocalChannel<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            tx: self.tx.clone(),
            rx: self.rx.clone(),
        }
    }
}

impl<T> fmt::Debug for LocalChannel<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalChannel")
            .field("name", &self.name)
            .field("capacity", &self.tx.max_capacity())
            .finish()
    }
}

#[async_trait]
impl<T> Channel<T> for LocalChannel<T>
where
    T: Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn put(&self, item: T) -> DocflowResult<()> {
        // The receiver is owned by the channel itself, so sending only fails if it was dropped
        // while a clone still held the sender, which cannot happen through this type.
        self.tx.send(item).await.map_err(|_| self.closed_error())
    }

    async fn poll(&self, timeout: Duration) -> DocflowResult<Option<T>> {
        let deadline = Instant::now() + timeout;

        // Lock acquisition counts against the timeout so that concurrent consumers stay bounded.
        let mut rx = match self.rx.try_lock() {
            Ok(rx) => rx,
            Err(_) => match tokio::time::timeout_at(deadline, self.rx.lock()).await {
                Ok(rx) => rx,
                Err(_) => return Ok(None),
            },
        };

        // Queued elements never go through the timer. A zero deadline can elapse before `recv`
        // completes once the task has used up its scheduling budget.
        match rx.try_recv() {
            Ok(item) => return Ok(Some(item)),
            Err(TryRecvError::Disconnected) => return Err(self.closed_error()),
            Err(TryRecvError::Empty) => {}
        }

        match tokio::time::timeout_at(deadline, rx.recv()).await {
            Ok(Some(item)) => Ok(Some(item)),
            Ok(None) => Err(self.closed_error()),
            Err(_) => Ok(None),
        }
    }
}

impl<T> LocalChannel<T> {
    fn closed_error(&self) -> DocflowError {
        docflow_error!(
            ErrorKind::ChannelClosed,
            "Local channel is closed",
            self.name.to_string()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn preserves_fifo_order() {
        let channel = LocalChannel::new("fifo", 8);
        for path in ["/a", "/b", "/c"] {
            channel.put(path.to_string()).await.unwrap();
        }

        assert_eq!(channel.len(), 3);
        let mut received = Vec::new();
        while let Some(item) = channel.poll(Duration::ZERO).await.unwrap() {
            received.push(item);
        }
        assert_eq!(received, vec!["/a", "/b", "/c"]);
        assert!(channel.is_empty());
    }

    #[tokio::test]
    async fn zero_timeout_poll_drains_a_large_backlog() {
        let channel = LocalChannel::new("backlog", 5_000);
        for i in 0..5_000u32 {
            channel.put(i).await.unwrap();
        }

        let mut received = Vec::new();
        while let Some(item) = channel.poll(Duration::ZERO).await.unwrap() {
            received.push(item);
        }

        assert_eq!(received, (0..5_000).collect::<Vec<_>>());
        assert!(channel.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn poll_waits_for_the_full_timeout_when_empty() {
        let channel = LocalChannel::<u32>::new("empty", 8);
        let start = Instant::now();

        let item = channel.poll(Duration::from_secs(2)).await.unwrap();

        assert_eq!(item, None);
        assert!(start.elapsed() >= Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn poll_returns_immediately_when_an_element_is_present() {
        let channel = LocalChannel::new("ready", 8);
        channel.put(7u32).await.unwrap();
        let start = Instant::now();

        let item = channel.poll(Duration::from_secs(120)).await.unwrap();

        assert_eq!(item, Some(7));
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn put_suspends_while_full() {
        let channel = LocalChannel::new("full", 1);
        channel.put(1u32).await.unwrap();

        let blocked = tokio::time::timeout(Duration::from_secs(1), channel.put(2)).await;
        assert!(blocked.is_err());

        assert_eq!(channel.poll(Duration::ZERO).await.unwrap(), Some(1));
        channel.put(3).await.unwrap();
        assert_eq!(channel.poll(Duration::ZERO).await.unwrap(), Some(3));
    }

    #[tokio::test]
    async fn concurrent_consumers_never_duplicate_elements() {
        let channel = LocalChannel::new("shared", 64);
        for i in 0..50u32 {
            channel.put(i).await.unwrap();
        }

        let mut consumers = Vec::new();
        for _ in 0..4 {
            let channel = channel.clone();
            consumers.push(tokio::spawn(async move {
                let mut seen = Vec::new();
                while let Some(item) = channel.poll(Duration::from_millis(10)).await.unwrap() {
                    seen.push(item);
                }
                seen
            }));
        }

        let mut all = Vec::new();
        for consumer in consumers {
            all.extend(consumer.await.unwrap());
        }
        all.sort_unstable();
        assert_eq!(all, (0..50).collect::<Vec<_>>());
    }
}
