//! Logging setup for the background task process.

use anyhow::{Context, Result};
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Default filter when neither `directives` nor `RUST_LOG` is given
const DEFAULT_DIRECTIVES: &str = "info";

/// Install the global subscriber.
///
/// `directives` takes precedence over `RUST_LOG`. Safe to call more than
/// once; later calls keep the first subscriber.
pub fn init_logging(directives: Option<&str>) -> Result<()> {
    let filter = match directives {
        Some(directives) => EnvFilter::try_new(directives)
            .with_context(|| format!("Invalid log filter: {directives}"))?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_DIRECTIVES.into()),
    };

    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .try_init();

    if installed.is_err() {
        debug!("Logging already initialized");
    }
    Ok(())
}
