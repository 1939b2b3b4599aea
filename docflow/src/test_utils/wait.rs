use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

use crate::concurrency::channel::Channel;

/// Default bound for test waits.
///
/// Most waits in tests should complete in a few milliseconds; this only guards against hangs.
pub const DEFAULT_TEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Awaits `future`, panicking if it does not complete within [`DEFAULT_TEST_TIMEOUT`].
///
/// # Panics
///
/// Panics on timeout, so that a broken completion condition fails the test instead of hanging
/// it.
pub async fn within<F>(future: F) -> F::Output
where
    F: Future,
{
    match tokio::time::timeout(DEFAULT_TEST_TIMEOUT, future).await {
        Ok(output) => output,
        Err(_) => panic!(
            "Test wait timed out after {DEFAULT_TEST_TIMEOUT:?}. \
             This likely indicates that a latch was never signalled or a stage never finished."
        ),
    }
}

/// Polls every element currently in `channel`, without waiting for new ones.
///
/// # Panics
///
/// Panics if the channel fails.
pub async fn drain<T, C>(channel: &C) -> Vec<T>
where
    T: Send + 'static,
    C: Channel<T> + ?Sized,
{
    let mut items = Vec::new();
    while let Some(item) = channel
        .poll(Duration::ZERO)
        .await
        .expect("failed to drain channel")
    {
        items.push(item);
    }

    items
}

/// Returns the output of `future` together with the time it took, in tokio time.
pub async fn timed<F>(future: F) -> (F::Output, Duration)
where
    F: Future,
{
    let start = Instant::now();
    let output = future.await;
    (output, start.elapsed())
}
