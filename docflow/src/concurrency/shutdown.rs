//! Cooperative cancellation for every suspending operation of the coordination core.
//!
//! A [`ShutdownTx`] is owned by whoever supervises a group of stages. Every blocking call takes
//! a [`ShutdownRx`] and races it against its own suspension point. On cancellation the call
//! returns a sentinel instead of an error. The shutdown flag lives in a watch channel and is
//! never consumed by observers, so a cancelled call leaves it set for every later check.

use std::future::pending;
use std::sync::Arc;
use tokio::sync::watch;

/// Outcome of an operation that can be interrupted by shutdown.
///
/// `Shutdown` carries whatever the operation could not complete, for instance the element a
/// cancelled `put` did not deliver.
#[derive(Debug, PartialEq, Eq)]
pub enum ShutdownResult<T, I> {
    Ok(T),
    Shutdown(I),
}

impl<T, I> ShutdownResult<T, I> {
    pub fn should_shutdown(&self) -> bool {
        matches!(self, ShutdownResult::Shutdown(_))
    }
}

/// Transmitter side of the shutdown channel.
#[derive(Debug, Clone)]
pub struct ShutdownTx(Arc<watch::Sender<bool>>);

impl ShutdownTx {
    /// Requests shutdown of every subscriber. Calling it again is a no-op.
    pub fn shutdown(&self) {
        // `send_replace` succeeds even when nobody is subscribed yet.
        self.0.send_replace(true);
    }

    pub fn is_shutdown(&self) -> bool {
        *self.0.borrow()
    }

    /// Creates a new receiver observing this transmitter.
    pub fn subscribe(&self) -> ShutdownRx {
        ShutdownRx(self.0.subscribe())
    }
}

/// Receiver side of the shutdown channel, threaded through blocking calls.
#[derive(Debug, Clone)]
pub struct ShutdownRx(watch::Receiver<bool>);

impl ShutdownRx {
    /// Returns a receiver that is never cancelled.
    ///
    /// Useful for callers that rely on timeouts alone.
    pub fn never() -> Self {
        let (_, rx) = watch::channel(false);
        Self(rx)
    }

    pub fn is_shutdown(&self) -> bool {
        *self.0.borrow()
    }

    /// Resolves once shutdown has been requested.
    ///
    /// Resolves immediately if shutdown was already requested and stays pending forever if the
    /// transmitter is dropped without requesting it.
    pub async fn cancelled(&self) {
        let mut rx = self.0.clone();
        if rx.wait_for(|shutdown| *shutdown).await.is_err() {
            pending::<()>().await;
        }
    }
}

/// Creates a new shutdown channel.
pub fn create_shutdown_channel() -> (ShutdownTx, ShutdownRx) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTx(Arc::new(tx)), ShutdownRx(rx))
}
