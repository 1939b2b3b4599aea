//! Completion latches used to tell stages that no more work is coming.
//!
//! A [`Latch`] abstracts a watch channel holding the number of signals still required. Because
//! watch receivers all observe the same value, a transition to zero wakes every waiter at once
//! and later waiters see the signalled state immediately.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::debug;

use crate::bail;
use crate::concurrency::shutdown::ShutdownRx;
use crate::error::{DocflowResult, ErrorKind};

/// Construction flavor of a [`Latch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LatchKind {
    /// Signalled by the first `signal()` call.
    OneShot,
    /// Signalled once `signal()` has been called `count` times.
    Counting { count: usize },
}

/// One-way, monotonic completion signal.
///
/// Clones share the same state. Once signalled, a latch stays signalled: extra calls to
/// [`Latch::signal`] are silently ignored.
#[derive(Debug, Clone)]
pub struct Latch {
    kind: LatchKind,
    remaining: Arc<watch::Sender<usize>>,
}

impl Latch {
    /// Creates a single-shot latch, typically used as a "producer is done" flag.
    pub fn one_shot() -> Self {
        Self::with_remaining(LatchKind::OneShot, 1)
    }

    /// Creates an N-of-N barrier that is signalled after `count` calls to [`Latch::signal`].
    ///
    /// Returns [`ErrorKind::InvalidArgument`] when `count` is zero.
    pub fn counting(count: usize) -> DocflowResult<Self> {
        if count == 0 {
            bail!(
                ErrorKind::InvalidArgument,
                "Counting latch requires a positive count",
                "count was 0"
            );
        }

        Ok(Self::with_remaining(LatchKind::Counting { count }, count))
    }

    fn with_remaining(kind: LatchKind, remaining: usize) -> Self {
        let (tx, _) = watch::channel(remaining);
        Self {
            kind,
            remaining: Arc::new(tx),
        }
    }

    pub fn kind(&self) -> LatchKind {
        self.kind
    }

    /// Number of signals still required before the latch is signalled.
    pub fn remaining(&self) -> usize {
        *self.remaining.borrow()
    }

    pub fn is_signalled(&self) -> bool {
        self.remaining() == 0
    }

    /// Records one signal, waking every waiter when the latch becomes signalled.
    pub fn signal(&self) {
        self.remaining.send_if_modified(|remaining| {
            if *remaining == 0 {
                return false;
            }

            *remaining -= 1;
            true
        });
    }

    /// Resolves once the latch is signalled, without any cancellation.
    pub async fn signalled(&self) {
        let mut rx = self.remaining.subscribe();
        // The sender lives as long as `self`, so the wait cannot observe a closed channel.
        let _ = rx.wait_for(|remaining| *remaining == 0).await;
    }

    /// Waits until the latch is signalled or `shutdown` is requested.
    ///
    /// Returns whether the latch is signalled. Cancellation is not an error.
    pub async fn wait(&self, shutdown: &ShutdownRx) -> bool {
        tokio::select! {
            biased;

            _ = self.signalled() => true,
            _ = shutdown.cancelled() => {
                debug!(kind = ?self.kind, "latch wait cancelled");
                self.is_signalled()
            }
        }
    }

    /// Waits at most `timeout` for the latch to be signalled.
    ///
    /// Returns whether the latch was signalled at or before the deadline.
    pub async fn wait_for(&self, timeout: Duration, shutdown: &ShutdownRx) -> bool {
        if self.is_signalled() {
            return true;
        }

        match tokio::time::timeout(timeout, self.wait(shutdown)).await {
            Ok(signalled) => signalled,
            Err(_) => self.is_signalled(),
        }
    }
}

/// Returns whether every latch in `latches` is signalled.
pub fn all_signalled(latches: &[Latch]) -> bool {
    latches.iter().all(Latch::is_signalled)
}

/// Resolves once every latch in `latches` is signalled.
pub async fn all_latches_signalled(latches: &[Latch]) {
    for latch in latches {
        latch.signalled().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::concurrency::shutdown::create_shutdown_channel;
    use std::time::Duration;
    use tokio::task::JoinSet;
    use tokio::time::{Instant, timeout};

    #[test]
    fn one_shot_stays_signalled() {
        let latch = Latch::one_shot();
        assert!(!latch.is_signalled());

        latch.signal();
        assert!(latch.is_signalled());

        latch.signal();
        latch.signal();
        assert!(latch.is_signalled());
        assert_eq!(latch.remaining(), 0);
    }

    #[test]
    fn counting_latch_needs_exactly_n_signals() {
        let latch = Latch::counting(3).unwrap();

        latch.signal();
        latch.signal();
        assert!(!latch.is_signalled());
        assert_eq!(latch.remaining(), 1);

        latch.signal();
        assert!(latch.is_signalled());

        // Extra signals beyond the count are ignored.
        latch.signal();
        assert!(latch.is_signalled());
        assert_eq!(latch.kind(), LatchKind::Counting { count: 3 });
    }

    #[test]
    fn counting_latch_rejects_zero() {
        let err = Latch::counting(0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn one_signal_wakes_every_waiter() {
        let latch = Latch::one_shot();
        let shutdown = ShutdownRx::never();
        let mut waiters = JoinSet::new();

        for _ in 0..8 {
            let latch = latch.clone();
            let shutdown = shutdown.clone();
            waiters.spawn(async move { latch.wait(&shutdown).await });
        }

        // Give the waiters a chance to block before signalling.
        tokio::time::sleep(Duration::from_millis(20)).await;
        latch.signal();

        let results = timeout(Duration::from_secs(5), async {
            let mut results = Vec::new();
            while let Some(result) = waiters.join_next().await {
                results.push(result.unwrap());
            }
            results
        })
        .await
        .expect("all waiters should be released");
        assert_eq!(results, vec![true; 8]);
    }

    #[tokio::test]
    async fn waiters_arriving_after_signal_return_immediately() {
        let latch = Latch::counting(1).unwrap();
        latch.signal();

        assert!(latch.wait(&ShutdownRx::never()).await);
    }

    #[tokio::test(start_paused = true)]
    async fn wait_for_times_out_on_unsignalled_latch() {
        let latch = Latch::one_shot();
        let start = Instant::now();

        let signalled = latch
            .wait_for(Duration::from_secs(3), &ShutdownRx::never())
            .await;

        assert!(!signalled);
        assert!(start.elapsed() >= Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn wait_returns_false_on_shutdown() {
        let latch = Latch::one_shot();
        let (tx, rx) = create_shutdown_channel();

        let waiter = tokio::spawn({
            let latch = latch.clone();
            async move { latch.wait(&rx).await }
        });

        tx.shutdown();
        assert!(!waiter.await.unwrap());
        assert!(!latch.is_signalled());
    }

    #[tokio::test]
    async fn all_latches_signalled_waits_for_every_latch() {
        let first = Latch::one_shot();
        let second = Latch::one_shot();
        let latches = vec![first.clone(), second.clone()];

        first.signal();
        assert!(!all_signalled(&latches));

        second.signal();
        timeout(Duration::from_secs(1), all_latches_signalled(&latches))
            .await
            .unwrap();
        assert!(all_signalled(&latches));
    }
}
