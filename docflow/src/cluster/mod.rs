//! Cluster coordination across processes that do not share memory.
//!
//! The [`coordinator::Coordinator`] hands out named [`channel::ClusterChannel`]s and
//! [`latch::ClusterLatch`]es and runs the membership handshake. Everything goes through the
//! capability traits in [`backend`]; [`memory`] provides an in-process implementation.

pub mod backend;
pub mod channel;
pub mod coordinator;
pub mod latch;
pub mod memory;

pub use backend::{Connector, CoordinationBackend, Member, ROLE_ATTRIBUTE};
pub use channel::ClusterChannel;
pub use coordinator::Coordinator;
pub use latch::ClusterLatch;
pub use memory::MemoryCluster;
