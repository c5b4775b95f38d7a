//! Logging initialization.
//!
//! The core only emits `tracing` events; installing a subscriber is the
//! embedder's decision. This helper wires the standard setup: env-filter
//! driven levels (`RUST_LOG`) with structured JSON output for production
//! log pipelines.

use tracing_subscriber::{fmt, EnvFilter};

/// Installs a JSON-formatted global subscriber filtered by `RUST_LOG`.
///
/// Safe to call more than once; later calls are no-ops.
pub fn init_json_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .json()
        .with_env_filter(filter)
        .with_current_span(false)
        .try_init();
}

/// Installs a human-readable subscriber for local development and tests.
///
/// Safe to call more than once; later calls are no-ops.
pub fn init_pretty_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_initialization_is_harmless() {
        init_pretty_logging();
        init_pretty_logging();
        init_json_logging();
    }
}
