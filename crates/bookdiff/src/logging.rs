//! Logging initialization for embedding binaries.
//!
//! The library only emits `tracing` events and `log` records; the embedding
//! application picks the subscriber. This helper wires a sensible default:
//! an `EnvFilter` honoring `RUST_LOG`, compact formatted output, and the
//! log-to-tracing bridge.

use tracing_subscriber::EnvFilter;

/// Initializes logging with an `info` default filter.
pub fn init() {
    init_with_default_filter("info");
}

/// Initializes logging, falling back to the given filter when `RUST_LOG`
/// is unset. Safe to call more than once; later calls are no-ops.
pub fn init_with_default_filter(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let _ = tracing_log::LogTracer::init();
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init();
}
