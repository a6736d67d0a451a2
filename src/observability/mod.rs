//! Logging setup.

use anyhow::{Context, Result};
use tracing_subscriber::{fmt, EnvFilter};

/// Filter used when `RUST_LOG` is unset or unparseable.
pub const DEFAULT_LOG_FILTER: &str = "info";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
}

/// Install the global `tracing` subscriber. Respects `RUST_LOG`, defaults to INFO.
///
/// Log lines go to stderr so CLI output on stdout stays clean.
pub fn init_logging() -> Result<()> {
    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to install the global tracing subscriber")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_filter_is_valid() {
        assert!(EnvFilter::try_new(DEFAULT_LOG_FILTER).is_ok());
    }

    #[test]
    fn second_init_reports_error_instead_of_panicking() {
        let _ = init_logging();
        assert!(init_logging().is_err());
    }
}
