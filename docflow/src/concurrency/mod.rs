//! Concurrency primitives shared by every docflow stage.
//!
//! Stages never share memory directly. They exchange elements through [`channel`]s and tell each
//! other that no more elements are coming through [`signal`] latches. Every suspending call takes
//! a [`shutdown::ShutdownRx`] so that a supervisor can stop a whole group of stages at once.
//!
//! # Coordination Patterns
//!
//! ## Completion
//!
//! A producer signals its "no more output" latch once it has put its last element. Consumers poll
//! with a bounded timeout and stop once every latch they depend on is signalled and a final
//! drain comes back empty. Because the signal happens after the last put, nothing can be missed
//! by a consumer that drains after observing the latch.
//!
//! ## Cancellation
//!
//! The [`shutdown`] module implements a watch-based flag. Waits race it with `tokio::select!` and
//! return a sentinel value (`None`, `false`, [`shutdown::ShutdownResult::Shutdown`]) instead of
//! failing.

pub mod channel;
pub mod shutdown;
pub mod signal;
