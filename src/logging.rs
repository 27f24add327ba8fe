//! Logging setup for the provider binary.
//!
//! All logs are written to **stderr**. Stdout carries the handshake line the
//! host reads to find the gRPC address, so nothing else may print there.
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: Controls log levels (e.g., `info`, `debug`, `fortiflex_provider=debug`)
//!
//! ```bash
//! # Trace every FortiFlex request path
//! RUST_LOG=fortiflex_provider::client=debug ./hemmer-provider-fortiflex
//! ```

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Filter used when `RUST_LOG` is not set.
///
/// The HTTP stack is noisy at `info`, so it is held back to warnings.
pub const DEFAULT_FILTER: &str = "info,hyper=warn,h2=warn,reqwest=warn,rustls=warn";

fn env_filter(default_directives: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives))
}

fn stderr_layer<S>() -> impl tracing_subscriber::Layer<S>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
}

/// Initialize the global `tracing` subscriber.
///
/// Respects `RUST_LOG` and falls back to [`DEFAULT_FILTER`].
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
pub fn init_logging() {
    tracing_subscriber::registry()
        .with(env_filter(DEFAULT_FILTER))
        .with(stderr_layer())
        .init();
}

/// Try to initialize logging, returning false if already initialized.
///
/// Integration tests call this from every test, so it must not panic when a
/// subscriber is already installed.
pub fn try_init_logging() -> bool {
    tracing_subscriber::registry()
        .with(env_filter(DEFAULT_FILTER))
        .with(stderr_layer())
        .try_init()
        .is_ok()
}
