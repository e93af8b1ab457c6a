//! Tracing initialization (fmt subscriber filtered by `RUST_LOG`).
//!
//! Embedders that already install their own subscriber can skip this; every
//! module only emits through the `tracing` macros.

use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Initialize tracing with console output.
///
/// The filter defaults to `info` and can be overridden with `RUST_LOG`
/// (e.g. `RUST_LOG=namectl=debug`). Fails if a global subscriber is already set.
pub fn init_telemetry() -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()?;

    info!("Telemetry initialized");

    Ok(())
}
