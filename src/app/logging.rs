//! Tracing setup for the shell embedding the engine.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::app::{Result, TidingsError};

/// Install a global subscriber reading its filter from `RUST_LOG`.
///
/// Call once at startup. Panics if a global subscriber is already set.
pub fn init() {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();
}

/// Install a global subscriber with an explicit filter such as
/// `"tidings=debug"`, failing instead of panicking when one is already set.
pub fn try_init_with_filter(filter: &str) -> Result<()> {
    let filter = EnvFilter::try_new(filter).map_err(|e| TidingsError::Other(e.to_string()))?;

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .try_init()
        .map_err(|e| TidingsError::Other(e.to_string()))
}
