//! Initialization of the `tracing` subscriber.
//!
//! Processes call [`init_tracing`] once at startup. Tests call [`init_test_tracing`], which is
//! idempotent and only installs a subscriber when `ENABLE_TRACING` is set, so test output stays
//! quiet by default.

use std::sync::Once;

use thiserror::Error;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{EnvFilter, fmt};

/// Filter applied when `RUST_LOG` is not set.
const DEFAULT_FILTER: &str = "info";

/// Environment variable enabling log output in tests.
const ENABLE_TRACING_ENV_NAME: &str = "ENABLE_TRACING";

static TEST_TRACING: Once = Once::new();

/// Errors returned when installing the global subscriber.
#[derive(Debug, Error)]
pub enum TracingError {
    /// A global subscriber was already installed.
    #[error("failed to install the tracing subscriber: {0}")]
    Init(#[from] TryInitError),
}

/// Installs the global subscriber for a docflow process.
///
/// The filter is read from `RUST_LOG` and defaults to `info`. Thread names are included so that
/// lines from concurrent stages can be told apart.
pub fn init_tracing(app_name: &str) -> Result<(), TracingError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into());

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_thread_names(true))
        .try_init()?;

    tracing::info!(app = app_name, "tracing initialized");

    Ok(())
}

/// Installs a test subscriber once per test binary when `ENABLE_TRACING` is set.
pub fn init_test_tracing() {
    if std::env::var(ENABLE_TRACING_ENV_NAME).is_err() {
        return;
    }

    TEST_TRACING.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "debug".into());

        // Another harness may already own the global subscriber; logs then go there.
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_test_writer())
            .try_init();
    });
}
