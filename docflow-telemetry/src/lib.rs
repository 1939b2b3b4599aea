//! Logging setup shared by docflow processes and tests.

pub mod tracing;
