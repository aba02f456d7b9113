//! Tracing setup helpers
//!
//! The balancer itself only emits `tracing` events; embedding applications
//! own the subscriber. These helpers cover the common case of a standalone
//! process that wants sane output without wiring layers by hand.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| "rondo=info".into())
}

/// Install a human-readable subscriber honoring `RUST_LOG`.
///
/// Safe to call more than once; later calls are no-ops.
pub fn init() {
    let _ = tracing_subscriber::registry()
        .with(env_filter())
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

/// Install a JSON subscriber honoring `RUST_LOG`, for log-shipping setups
/// that want one structured object per line.
pub fn init_json() {
    let _ = tracing_subscriber::registry()
        .with(env_filter())
        .with(tracing_subscriber::fmt::layer().json())
        .try_init();
}
