//! Tracing bootstrap for embedders.
//!
//! The engine itself only emits `tracing` events; wiring a subscriber is
//! the embedder's choice. This helper installs a sensible default:
//! env-filtered, compact, to stderr.

use tracing_subscriber::EnvFilter;

/// Install the default subscriber. Safe to call more than once; later
/// calls are no-ops.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .compact()
        .try_init();
}
