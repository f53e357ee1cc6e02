//! # SOF Observe - Observability Layer
//!
//! Structured logging and the tracing spans the registry opens around
//! access decisions and mutations.

use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub mod logging;

pub use logging::{init_logging, LogConfig, LogFormat};

/// Default filter when `RUST_LOG` is unset
pub const DEFAULT_FILTER: &str = "info,sof=debug";

/// Initialize tracing with default configuration
pub fn init_tracing() -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(true));

    // Try to init, but don't fail if already initialized
    if subscriber.try_init().is_err() {
        tracing::debug!("Tracing already initialized, skipping");
        return Ok(());
    }

    tracing::info!("Tracing initialized");
    Ok(())
}
