//! Tracing bootstrap.
//!
//! The library only emits `tracing` events; installing a subscriber is the
//! embedder's call. `init` wires up a stderr subscriber filtered by
//! `PLANLOG_LOG` (falling back to `RUST_LOG`), for binaries and tests that
//! want output without assembling their own.

use tracing_subscriber::EnvFilter;

const FILTER_ENV: &str = "PLANLOG_LOG";

/// Install the default stderr subscriber. Safe to call more than once;
/// later calls are no-ops.
pub fn init() {
    let filter = EnvFilter::try_from_env(FILTER_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
