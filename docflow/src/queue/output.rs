use std::fmt;

use crate::concurrency::channel::ChannelRef;
use crate::concurrency::shutdown::{ShutdownResult, ShutdownRx};
use crate::concurrency::signal::Latch;
use crate::error::DocflowResult;

/// Producer side of a stage: a channel paired with a "no more output" latch.
///
/// The producer puts every element and then signals [`OutputQueue::no_more_output`]. Consumers
/// rely on that order to know when a drained channel will stay empty.
pub struct OutputQueue<T> {
    output: ChannelRef<T>,
    no_more_output: Latch,
    shutdown: ShutdownRx,
}

impl<T> OutputQueue<T>
where
    T: Clone + Send + 'static,
{
    /// Creates a producer over `output` with a fresh one-shot completion latch.
    pub fn new(output: ChannelRef<T>, shutdown: ShutdownRx) -> Self {
        Self::with_latch(output, Latch::one_shot(), shutdown)
    }

    /// Creates a producer over `output` signalling `no_more_output` when done.
    ///
    /// Passing a counting latch lets several producers share one completion condition.
    pub fn with_latch(output: ChannelRef<T>, no_more_output: Latch, shutdown: ShutdownRx) -> Self {
        Self {
            output,
            no_more_output,
            shutdown,
        }
    }

    /// Enqueues `item`, suspending while the channel is full.
    ///
    /// Returns [`ShutdownResult::Shutdown`] with the undelivered element when shutdown is
    /// requested before the channel accepts it. Errors are reserved for channel failures.
    pub async fn put(&self, item: T) -> DocflowResult<ShutdownResult<(), T>> {
        if self.shutdown.is_shutdown() {
            return Ok(ShutdownResult::Shutdown(item));
        }

        // Channel puts are cancel safe: dropping the attempt leaves the channel untouched.
        let attempt = self.output.put(item.clone());
        tokio::select! {
            biased;

            _ = self.shutdown.cancelled() => Ok(ShutdownResult::Shutdown(item)),
            result = attempt => result.map(ShutdownResult::Ok),
        }
    }

    /// Latch to signal once the last element has been put.
    pub fn no_more_output(&self) -> &Latch {
        &self.no_more_output
    }

    pub fn output(&self) -> &ChannelRef<T> {
        &self.output
    }
}

impl<T: Send + 'static> fmt::Debug for OutputQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputQueue")
            .field("output", &self.output.name())
            .field("no_more_output", &self.no_more_output)
            .finish()
    }
}
