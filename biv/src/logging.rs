//! Tracing setup for the `biv` binary.
//!
//! Progress of the stages goes to stderr through `tracing`. External tool
//! output is not logged here; it is captured to `<root>/logs/<stage>.log`.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber.
///
/// Reads `RUST_LOG`, defaulting to `info`. Output: stderr, compact format.
///
/// # Example
/// ```bash
/// RUST_LOG=biv=debug,purkinje=debug biv --resume
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
