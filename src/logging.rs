//! Log subscriber setup for the binary.

use crate::error::StartupError;

use tracing_subscriber::EnvFilter;

/// Installs a fmt subscriber. `RUST_LOG` takes precedence over `default_filter`.
pub fn init(default_filter: &str) -> Result<(), StartupError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .map_err(|e| StartupError::Logging(e.to_string()))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .map_err(|e| StartupError::Logging(e.to_string()))
}
