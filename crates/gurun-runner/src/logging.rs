//! Subscriber setup for binaries that drive a runner.

use tracing_subscriber::EnvFilter;

/// Install a compact fmt subscriber.
///
/// `RUST_LOG` wins when set; otherwise `default_level` (e.g. `"info"` or
/// `"gurun_node=debug"`) is used as the filter directive.  Panics if a
/// global subscriber is already installed.
pub fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

/// Like [`init_tracing`], but returns `false` instead of panicking when a
/// subscriber is already installed.  Handy in tests.
pub fn try_init_tracing(default_level: &str) -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .try_init()
        .is_ok()
}
