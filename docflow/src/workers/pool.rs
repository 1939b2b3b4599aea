use futures::FutureExt;
use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use tokio::task::{Id, JoinSet};
use tracing::{Instrument, debug, error, info, warn};

use crate::docflow_error;
use crate::error::{DocflowResult, ErrorKind};
use crate::workers::base::{StageOutcome, Worker};

type WorkerResult = Result<StageOutcome, Box<dyn Any + Send>>;

/// Outcomes collected by [`WorkerPool::wait_all`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolReport {
    /// Names of the workers that returned [`StageOutcome::Success`].
    pub succeeded: Vec<String>,
    /// Names of the workers that returned [`StageOutcome::Failure`] or were aborted.
    pub failed: Vec<String>,
}

impl PoolReport {
    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Runs stage workers concurrently and collects their outcomes.
#[derive(Debug, Default)]
pub struct WorkerPool {
    join_set: JoinSet<WorkerResult>,
    names: HashMap<Id, String>,
}

impl WorkerPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawns `worker` on the current runtime.
    pub fn spawn<W>(&mut self, worker: W)
    where
        W: Worker + Send + 'static,
    {
        let name = worker.name().to_string();
        let span = tracing::info_span!("stage", name = %name);

        debug!(worker = %name, "spawning worker in pool");

        let handle = self.join_set.spawn(
            AssertUnwindSafe(worker.run())
                .catch_unwind()
                .instrument(span),
        );
        self.names.insert(handle.id(), name);
    }

    /// Number of workers that have not been collected yet.
    pub fn len(&self) -> usize {
        self.join_set.len()
    }

    pub fn is_empty(&self) -> bool {
        self.join_set.is_empty()
    }

    /// Waits for every spawned worker.
    ///
    /// Worker failures are part of the report. Panics are collected and returned as
    /// [`ErrorKind::WorkerPanic`] errors once every worker is done.
    pub async fn wait_all(&mut self) -> DocflowResult<PoolReport> {
        let mut report = PoolReport::default();
        let mut errors = Vec::new();

        while let Some(result) = self.join_set.join_next_with_id().await {
            let id = match &result {
                Ok((id, _)) => *id,
                Err(join_err) => join_err.id(),
            };
            let name = self
                .names
                .remove(&id)
                .unwrap_or_else(|| format!("task-{id}"));

            match result {
                Ok((_, Ok(StageOutcome::Success))) => {
                    info!(worker = %name, "worker completed");
                    report.succeeded.push(name);
                }
                Ok((_, Ok(StageOutcome::Failure))) => {
                    warn!(worker = %name, "worker completed with failure");
                    report.failed.push(name);
                }
                Ok((_, Err(panic))) => {
                    let message = panic_message(panic.as_ref());
                    error!(worker = %name, %message, "worker panicked");
                    errors.push(docflow_error!(
                        ErrorKind::WorkerPanic,
                        "Stage worker panicked",
                        format!("worker '{name}': {message}")
                    ));
                }
                Err(join_err) => {
                    if join_err.is_cancelled() {
                        warn!(worker = %name, "worker was aborted");
                        report.failed.push(name);
                    } else {
                        errors.push(docflow_error!(
                            ErrorKind::WorkerPanic,
                            "Stage worker task failed",
                            format!("worker '{name}': {join_err}")
                        ));
                    }
                }
            }
        }

        if errors.is_empty() {
            Ok(report)
        } else {
            Err(errors.into())
        }
    }

    /// Aborts every running worker. Aborted workers are reported as failed by
    /// [`WorkerPool::wait_all`].
    pub fn abort_all(&mut self) {
        self.join_set.abort_all();
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::future::Future;

    struct FixedWorker {
        name: &'static str,
        outcome: StageOutcome,
    }

    impl Worker for FixedWorker {
        fn name(&self) -> &str {
            self.name
        }

        fn run(self) -> impl Future<Output = StageOutcome> + Send {
            async move { self.outcome }
        }
    }

    struct StalledWorker;

    impl Worker for StalledWorker {
        fn name(&self) -> &str {
            "stalled"
        }

        fn run(self) -> impl Future<Output = StageOutcome> + Send {
            std::future::pending()
        }
    }

    struct PanickingWorker;

    impl Worker for PanickingWorker {
        fn name(&self) -> &str {
            "panicking"
        }

        #[allow(unreachable_code)]
        fn run(self) -> impl Future<Output = StageOutcome> + Send {
            async move {
                panic!("stage exploded");
                StageOutcome::Success
            }
        }
    }

    #[tokio::test]
    async fn collects_successes_and_failures() {
        let mut pool = WorkerPool::new();
        pool.spawn(FixedWorker {
            name: "scan",
            outcome: StageOutcome::Success,
        });
        pool.spawn(FixedWorker {
            name: "parse",
            outcome: StageOutcome::Failure,
        });
        assert_eq!(pool.len(), 2);

        let report = pool.wait_all().await.unwrap();

        assert_eq!(report.succeeded, vec!["scan".to_string()]);
        assert_eq!(report.failed, vec!["parse".to_string()]);
        assert!(!report.all_succeeded());
        assert!(pool.is_empty());
    }

    #[tokio::test]
    async fn panics_are_reported_as_errors() {
        let mut pool = WorkerPool::new();
        pool.spawn(PanickingWorker);
        pool.spawn(FixedWorker {
            name: "index",
            outcome: StageOutcome::Success,
        });

        let err = pool.wait_all().await.unwrap_err();

        assert_eq!(err.kinds(), vec![ErrorKind::WorkerPanic]);
        let detail = err.detail().unwrap();
        assert!(detail.contains("panicking"));
        assert!(detail.contains("stage exploded"));
    }

    #[tokio::test]
    async fn aborted_workers_are_reported_by_name() {
        let mut pool = WorkerPool::new();
        pool.spawn(StalledWorker);
        pool.spawn(FixedWorker {
            name: "scan",
            outcome: StageOutcome::Success,
        });
        tokio::task::yield_now().await;

        pool.abort_all();
        let report = pool.wait_all().await.unwrap();

        assert!(report.failed.contains(&"stalled".to_string()));
        assert!(!report.failed.iter().any(|name| name.starts_with("task-")));
        assert_eq!(report.succeeded.len() + report.failed.len(), 2);
        assert!(pool.is_empty());
    }
}
