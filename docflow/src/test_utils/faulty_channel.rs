use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::bail;
use crate::concurrency::channel::{Channel, ChannelRef};
use crate::error::{DocflowResult, ErrorKind};

type FailureCondition<T> = Arc<dyn Fn(&T) -> bool + Send + Sync>;

/// Channel wrapper that rejects selected puts with [`ErrorKind::ForwardingFailed`].
///
/// Rejected elements never reach the wrapped channel. Polls are delegated unchanged.
pub struct FaultyChannel<T> {
    inner: ChannelRef<T>,
    fail_when: FailureCondition<T>,
    failures: Arc<AtomicUsize>,
}

impl<T> FaultyChannel<T>
where
    T: Send + 'static,
{
    /// Wraps `inner`, failing every put whose element satisfies `fail_when`.
    pub fn failing_when<F>(inner: ChannelRef<T>, fail_when: F) -> Self
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        Self {
            inner,
            fail_when: Arc::new(fail_when),
            failures: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Wraps `inner`, failing every put.
    pub fn always_failing(inner: ChannelRef<T>) -> Self {
        Self::failing_when(inner, |_| true)
    }

    /// Number of puts rejected so far.
    pub fn failures(&self) -> usize {
        self.failures.load(Ordering::SeqCst)
    }

    pub fn into_ref(self) -> ChannelRef<T> {
        Arc::new(self)
    }
}

impl<T> Clone for FaultyChannel<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            fail_when: self.fail_when.clone(),
            failures: self.failures.clone(),
        }
    }
}

impl<T: Send + 'static> fmt::Debug for FaultyChannel<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FaultyChannel")
            .field("inner", &self.inner.name())
            .field("failures", &self.failures())
            .finish()
    }
}

#[async_trait]
impl<T> Channel<T> for FaultyChannel<T>
where
    T: Send + 'static,
{
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn put(&self, item: T) -> DocflowResult<()> {
        if (self.fail_when)(&item) {
            self.failures.fetch_add(1, Ordering::SeqCst);
            bail!(
                ErrorKind::ForwardingFailed,
                "Injected put failure",
                self.inner.name()
            );
        }

        self.inner.put(item).await
    }

    async fn poll(&self, timeout: Duration) -> DocflowResult<Option<T>> {
        self.inner.poll(timeout).await
    }
}
