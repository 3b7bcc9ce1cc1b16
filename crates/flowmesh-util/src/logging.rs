//! Structured logging setup, shared by every flowmesh binary.

use tracing::Level;

/// Install a `tracing_subscriber::fmt` subscriber honoring `RUST_LOG` (or
/// the supplied fallback filter when unset). Safe to call more than once;
/// later calls are no-ops.
pub fn init_tracing(default_filter: &str) {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter.to_string());
    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_max_level(Level::TRACE).try_init();
}
