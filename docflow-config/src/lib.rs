//! Configuration types and loading for docflow coordination.
//!
//! The [`shared`] module holds the serde structures consumed by the coordination core, while
//! [`load`] and [`environment`] implement the layered file and environment-variable loader.

pub mod environment;
pub mod load;
pub mod shared;

pub use load::{Config, LoadConfigError, load_config, load_config_from};
