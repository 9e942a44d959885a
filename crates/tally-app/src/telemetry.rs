//! Tracing setup.

use tracing_subscriber::EnvFilter;

/// Initializes the global tracing subscriber.
///
/// ## Log Levels
/// - `RUST_LOG` wins when set, e.g. `RUST_LOG=tally=trace`
/// - otherwise `filter` (usually [`crate::config::AppConfig::log_filter`])
///
/// Safe to call more than once; later calls are ignored.
pub fn init_tracing(filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
