use std::fmt;
use std::future::Future;

use crate::concurrency::signal::Latch;

/// Final result of a stage run.
///
/// Stages never fail across their boundary: errors, timeouts and cancellation are logged inside
/// the stage and reported as [`StageOutcome::Failure`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageOutcome {
    Success,
    Failure,
}

impl StageOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, StageOutcome::Success)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StageOutcome::Success => "success",
            StageOutcome::Failure => "failure",
        }
    }
}

impl fmt::Display for StageOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unit of work of a pipeline stage.
///
/// A worker runs exactly once: [`Worker::run`] consumes it.
pub trait Worker {
    /// Name used in logs, metrics and pool reports.
    fn name(&self) -> &str;

    /// Runs the stage to completion.
    fn run(self) -> impl Future<Output = StageOutcome> + Send;
}

/// Stage whose completion can be observed by downstream stages.
pub trait NoMoreOutput {
    /// Latch signalled once the stage has put its last element.
    fn no_more_output(&self) -> &Latch;
}
