//! Tracing subscriber setup

use tracing_subscriber::EnvFilter;

/// Install a formatting subscriber for the process.
///
/// `RUST_LOG` wins over `default_filter` when set. Calling this again after a
/// subscriber is installed (by this function or by the host) does nothing, so
/// tests and demos can call it freely.
pub fn init_tracing(default_filter: &str) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .try_init();
}
