//! Tracing setup for binaries embedding the client.

use tracing_subscriber::EnvFilter;

/// Install a fmt subscriber honoring `RUST_LOG`, defaulting to debug-level
/// output for this crate. Safe to call more than once; later calls are no-ops.
pub fn init() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("memeshare_client=debug"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
