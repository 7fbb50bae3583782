//! Tracing subscriber setup shared by the command-line front-ends.

use tracing_subscriber::EnvFilter;

/// Initialize the global tracing subscriber.
///
/// `verbose` raises the default filter so protocol-level frame dumps
/// (`debug`/`trace` events from this crate) become visible. An explicit
/// `RUST_LOG` always wins over either default.
pub fn init(verbose: bool) {
    let default_filter = if verbose { "info,zkgate=trace" } else { "info" };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();
}
