//! Structured logging setup. `tracing` spans mark each pipeline phase
//! (station listing, detail fetch, image fetch, composite); this module
//! only wires up the subscriber the binary installs at startup.

use tracing_subscriber::EnvFilter;

/// Initializes the global `tracing` subscriber with `filter` as the
/// default directive, unless the `RUST_LOG` environment variable is set,
/// in which case that takes precedence (the usual `EnvFilter` behavior).
pub fn init(filter: &str) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .init();
}
