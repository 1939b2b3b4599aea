use docflow_config::shared::QueueConfig;
use futures::StreamExt;
use futures::stream::FuturesUnordered;
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;
use tracing::warn;

use crate::bail;
use crate::concurrency::channel::ChannelRef;
use crate::concurrency::shutdown::ShutdownRx;
use crate::concurrency::signal::{Latch, all_latches_signalled, all_signalled};
use crate::error::{DocflowResult, ErrorKind};
use crate::queue::output::OutputQueue;

/// Consumer side of a stage: one or more source channels paired with their "no more input"
/// latches.
///
/// A consumer is done once [`InputQueue::is_exhausted`] holds and a final zero-timeout poll
/// comes back empty.
pub struct InputQueue<T> {
    sources: Vec<ChannelRef<T>>,
    no_more_input: Vec<Latch>,
    default_timeout: Duration,
    shutdown: ShutdownRx,
}

impl<T> InputQueue<T>
where
    T: Send + 'static,
{
    /// Creates a consumer over a single source.
    pub fn new(
        source: ChannelRef<T>,
        no_more_input: Latch,
        config: &QueueConfig,
        shutdown: ShutdownRx,
    ) -> Self {
        Self {
            sources: vec![source],
            no_more_input: vec![no_more_input],
            default_timeout: config.poll_timeout(),
            shutdown,
        }
    }

    /// Creates a consumer merging several sources.
    ///
    /// Returns [`ErrorKind::InvalidArgument`] when `sources` is empty.
    pub fn from_sources(
        sources: impl IntoIterator<Item = (ChannelRef<T>, Latch)>,
        config: &QueueConfig,
        shutdown: ShutdownRx,
    ) -> DocflowResult<Self> {
        let (sources, no_more_input): (Vec<_>, Vec<_>) = sources.into_iter().unzip();
        if sources.is_empty() {
            bail!(
                ErrorKind::InvalidArgument,
                "Input queue requires at least one source"
            );
        }

        Ok(Self {
            sources,
            no_more_input,
            default_timeout: config.poll_timeout(),
            shutdown,
        })
    }

    /// Creates a consumer reading what `producer` outputs.
    pub fn consuming(producer: &OutputQueue<T>, config: &QueueConfig, shutdown: ShutdownRx) -> Self
    where
        T: Clone,
    {
        Self::new(
            producer.output().clone(),
            producer.no_more_output().clone(),
            config,
            shutdown,
        )
    }

    /// Dequeues the next element from any source, waiting at most `timeout`.
    ///
    /// Returns `None` on timeout or when shutdown is requested. With several sources the first
    /// element available wins; there is no ordering or fairness across sources. A failing source
    /// is logged and contributes nothing for this call.
    pub async fn poll(&self, timeout: Duration) -> Option<T> {
        if self.shutdown.is_shutdown() {
            return None;
        }

        tokio::select! {
            biased;

            _ = self.shutdown.cancelled() => None,
            item = self.poll_sources(timeout) => item,
        }
    }

    /// Dequeues the next element using the configured default bound.
    pub async fn poll_default(&self) -> Option<T> {
        self.poll(self.default_timeout).await
    }

    /// Latches signalled by the producers once they are done.
    pub fn no_more_input(&self) -> &[Latch] {
        &self.no_more_input
    }

    /// Returns whether every producer has signalled that it is done.
    pub fn is_exhausted(&self) -> bool {
        all_signalled(&self.no_more_input)
    }

    /// Resolves once every producer has signalled that it is done.
    pub async fn exhausted(&self) {
        all_latches_signalled(&self.no_more_input).await
    }

    pub fn sources(&self) -> &[ChannelRef<T>] {
        &self.sources
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    async fn poll_sources(&self, timeout: Duration) -> Option<T> {
        let deadline = Instant::now() + timeout;

        if let [source] = self.sources.as_slice() {
            return poll_source(source, timeout, deadline).await;
        }

        // Losing polls are dropped, which is fine because channel polls are cancel safe.
        let mut polls = self
            .sources
            .iter()
            .map(|source| poll_source(source, timeout, deadline))
            .collect::<FuturesUnordered<_>>();

        while let Some(result) = polls.next().await {
            if result.is_some() {
                return result;
            }
        }

        None
    }
}

async fn poll_source<T>(source: &ChannelRef<T>, timeout: Duration, deadline: Instant) -> Option<T>
where
    T: Send + 'static,
{
    match source.poll(timeout).await {
        Ok(item) => item,
        Err(err) => {
            warn!(source = source.name(), error = %err, "failed to poll source channel");

            // Keep the call bounded by its timeout instead of spinning on a broken source.
            tokio::time::sleep_until(deadline).await;
            None
        }
    }
}

impl<T: Send + 'static> fmt::Debug for InputQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sources: Vec<&str> = self.sources.iter().map(|source| source.name()).collect();
        f.debug_struct("InputQueue")
            .field("sources", &sources)
            .field("no_more_input", &self.no_more_input)
            .field("default_timeout", &self.default_timeout)
            .finish()
    }
}
