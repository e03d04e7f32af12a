//! Telemetry and Observability
//!
//! Structured logging setup for embedding processes. The library only
//! emits `tracing` events; hosts that already install a subscriber of
//! their own can skip this module entirely.

use tracing_subscriber::{
    fmt,
    layer::SubscriberExt,
    util::{SubscriberInitExt, TryInitError},
    EnvFilter,
};

/// Filter applied when `RUST_LOG` is unset.
const DEFAULT_DIRECTIVES: &str = "info,social_core=debug";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES))
}

/// Install the global tracing subscriber with human-readable output.
///
/// Panics if a subscriber is already installed; hosts that cannot
/// guarantee a single call should use [`try_init_tracing`].
pub fn init_tracing() {
    try_init_tracing().expect("a global tracing subscriber is already installed");
}

/// Fallible variant of [`init_tracing`] for hosts and test harnesses
/// that may race to install the subscriber.
pub fn try_init_tracing() -> Result<(), TryInitError> {
    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(env_filter())
        .with(fmt_layer)
        .try_init()?;

    tracing::info!("Tracing initialized");
    Ok(())
}

/// Install the global subscriber with newline-delimited JSON output,
/// event fields flattened to the top level for log shippers.
pub fn init_tracing_json() {
    let json_layer = fmt::layer()
        .json()
        .flatten_event(true)
        .with_target(true)
        .with_file(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(env_filter())
        .with(json_layer)
        .init();

    tracing::info!("Tracing initialized");
}
