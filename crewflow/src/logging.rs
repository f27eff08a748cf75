//! Diagnostic tracing for the `crewflow` binary.
//!
//! Library code only emits `tracing` events; installing a subscriber is the
//! binary's job.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the tracing subscriber.
///
/// Reads `RUST_LOG`. Defaults to `warn` if unset.
/// Output: stderr, compact format.
///
/// # Example
/// ```bash
/// RUST_LOG=crewflow=debug crewflow "As a user, I want ..."
/// ```
pub fn init() {
    init_with_default("warn");
}

/// Like [`init`], with a different default directive.
///
/// Does nothing if a global subscriber is already installed.
pub fn init_with_default(default_directive: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .try_init();
}
