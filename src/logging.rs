use crate::config::{DEFAULT_LOG_FILTER, LOG_VAR};
use tracing_subscriber::EnvFilter;

/// Installs the stderr `fmt` subscriber, filtered by `CHARM_LOG`.
///
/// Safe to call more than once; only the first call installs anything.
pub fn init() {
    let filter =
        EnvFilter::try_from_env(LOG_VAR).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
