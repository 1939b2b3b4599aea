use docflow_config::shared::QueueConfig;
use metrics::counter;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::concurrency::channel::{ChannelRef, LocalChannel};
use crate::concurrency::shutdown::{ShutdownResult, ShutdownRx};
use crate::concurrency::signal::Latch;
use crate::error::DocflowResult;
use crate::failpoints::{FAN_OUT_BEFORE_PUT, docflow_fail_point};
use crate::metrics::{
    DESTINATION_LABEL, DOCFLOW_FAN_OUT_FAILURES_TOTAL, DOCFLOW_FAN_OUT_FORWARDED_TOTAL,
    DOCFLOW_FAN_OUT_RECEIVED_TOTAL, STAGE_LABEL,
};
use crate::queue::InputQueue;
use crate::workers::base::{NoMoreOutput, StageOutcome, Worker};

/// Growable, shared list of destinations of a [`FanOutStage`].
///
/// Clones share the same list, so destinations can be added while the stage runs. Each element
/// is forwarded to the destinations registered at the time it is received.
pub struct Destinations<T> {
    channels: Arc<RwLock<Vec<ChannelRef<T>>>>,
}

impl<T> Destinations<T> {
    fn new() -> Self {
        Self {
            channels: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Registers `channel` after every destination added so far.
    pub fn add(&self, channel: ChannelRef<T>) {
        self.channels
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(channel);
    }

    pub fn len(&self) -> usize {
        self.channels
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn snapshot(&self) -> Vec<ChannelRef<T>> {
        self.channels
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl<T> Clone for Destinations<T> {
    fn clone(&self) -> Self {
        Self {
            channels: self.channels.clone(),
        }
    }
}

/// Stage replicating every element of its sources to every destination.
///
/// Forwarding is best effort: a destination whose put fails or is cancelled misses that element,
/// while the other destinations still get it and the stage moves on. Each destination receives
/// elements in the order the stage received them.
///
/// The stage completes once every source latch is signalled and a final drain finds nothing. It
/// then signals its own [`NoMoreOutput::no_more_output`] latch, so that it can feed further
/// stages.
pub struct FanOutStage<T> {
    name: String,
    input: InputQueue<T>,
    destinations: Destinations<T>,
    no_more_output: Latch,
    shutdown: ShutdownRx,
}

impl<T> FanOutStage<T>
where
    T: Clone + Send + 'static,
{
    /// Creates a stage reading from `input`, without destinations.
    pub fn new(name: impl Into<String>, input: InputQueue<T>, shutdown: ShutdownRx) -> Self {
        Self {
            name: name.into(),
            input,
            destinations: Destinations::new(),
            no_more_output: Latch::one_shot(),
            shutdown,
        }
    }

    /// Creates a stage fed by `upstream` through a new local channel.
    ///
    /// The channel is registered as a destination of `upstream`, so it only receives elements
    /// `upstream` forwards from now on.
    pub fn downstream_of(
        upstream: &FanOutStage<T>,
        name: impl Into<String>,
        config: &QueueConfig,
        shutdown: ShutdownRx,
    ) -> Self {
        let name = name.into();
        let channel = LocalChannel::new(format!("{name}-input"), config.capacity).into_ref();
        upstream.add_output(channel.clone());

        let input = InputQueue::new(
            channel,
            upstream.no_more_output().clone(),
            config,
            shutdown.clone(),
        );

        Self::new(name, input, shutdown)
    }

    /// Registers a destination. Allowed before and during the run.
    pub fn add_output(&self, channel: ChannelRef<T>) {
        debug!(stage = %self.name, destination = channel.name(), "added fan-out destination");
        self.destinations.add(channel);
    }

    /// Handle to add destinations once the stage has been moved into a task.
    pub fn destinations(&self) -> Destinations<T> {
        self.destinations.clone()
    }

    /// Runs the stage until its sources are exhausted or shutdown is requested.
    pub async fn run(self) -> StageOutcome {
        info!(
            stage = %self.name,
            sources = self.input.sources().len(),
            destinations = self.destinations.len(),
            "starting fan-out stage"
        );

        if self.forward_until_exhausted().await {
            self.no_more_output.signal();
            info!(stage = %self.name, "fan-out stage completed");

            StageOutcome::Success
        } else {
            info!(stage = %self.name, "fan-out stage stopped due to shutdown");

            StageOutcome::Failure
        }
    }

    /// Returns `true` once everything was forwarded and `false` on shutdown.
    async fn forward_until_exhausted(&self) -> bool {
        let poll_timeout = self.input.default_timeout();

        loop {
            if self.shutdown.is_shutdown() {
                return false;
            }

            // Producers signal after their last put, so once every latch is signalled an empty
            // poll means that nothing else will arrive.
            if self.input.is_exhausted() {
                match self.input.poll(Duration::ZERO).await {
                    Some(item) => {
                        self.forward(item).await;
                        continue;
                    }
                    None => return !self.shutdown.is_shutdown(),
                }
            }

            let item = tokio::select! {
                item = self.input.poll(poll_timeout) => item,
                _ = self.input.exhausted() => None,
            };

            if let Some(item) = item {
                self.forward(item).await;
            }
        }
    }

    async fn forward(&self, item: T) {
        counter!(DOCFLOW_FAN_OUT_RECEIVED_TOTAL, STAGE_LABEL => self.name.clone()).increment(1);

        for destination in self.destinations.snapshot() {
            match self.put_into(&destination, item.clone()).await {
                Ok(ShutdownResult::Ok(())) => {
                    counter!(
                        DOCFLOW_FAN_OUT_FORWARDED_TOTAL,
                        STAGE_LABEL => self.name.clone(),
                        DESTINATION_LABEL => destination.name().to_string()
                    )
                    .increment(1);
                }
                Ok(ShutdownResult::Shutdown(_)) => {
                    warn!(
                        stage = %self.name,
                        destination = destination.name(),
                        "put cancelled by shutdown, element not forwarded to destination"
                    );
                    self.record_failure(&destination);
                }
                Err(err) => {
                    warn!(
                        stage = %self.name,
                        destination = destination.name(),
                        error = %err,
                        "failed to forward element to destination, skipping it"
                    );
                    self.record_failure(&destination);
                }
            }
        }
    }

    async fn put_into(
        &self,
        destination: &ChannelRef<T>,
        item: T,
    ) -> DocflowResult<ShutdownResult<(), T>> {
        docflow_fail_point(FAN_OUT_BEFORE_PUT, destination.name())?;

        if self.shutdown.is_shutdown() {
            return Ok(ShutdownResult::Shutdown(item));
        }

        let attempt = destination.put(item.clone());
        tokio::select! {
            biased;

            _ = self.shutdown.cancelled() => Ok(ShutdownResult::Shutdown(item)),
            result = attempt => result.map(ShutdownResult::Ok),
        }
    }

    fn record_failure(&self, destination: &ChannelRef<T>) {
        counter!(
            DOCFLOW_FAN_OUT_FAILURES_TOTAL,
            STAGE_LABEL => self.name.clone(),
            DESTINATION_LABEL => destination.name().to_string()
        )
        .increment(1);
    }
}

impl<T> NoMoreOutput for FanOutStage<T> {
    fn no_more_output(&self) -> &Latch {
        &self.no_more_output
    }
}

impl<T> Worker for FanOutStage<T>
where
    T: Clone + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn run(self) -> impl Future<Output = StageOutcome> + Send {
        FanOutStage::run(self)
    }
}

impl<T: Send + 'static> fmt::Debug for FanOutStage<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FanOutStage")
            .field("name", &self.name)
            .field("input", &self.input)
            .field("destinations", &self.destinations.len())
            .field("no_more_output", &self.no_more_output)
            .finish()
    }
}
