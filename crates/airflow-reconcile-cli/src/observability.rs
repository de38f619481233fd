//! Log setup for the binary. stdout carries JSON results, so logs go to stderr.

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// `log_level` from the provider config applies unless RUST_LOG holds a
/// parseable filter.
pub fn init_tracing(log_level: &str) {
    let filter = match std::env::var("RUST_LOG") {
        Ok(_) => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)),
        Err(_) => EnvFilter::new(log_level),
    };

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .try_init();
}
