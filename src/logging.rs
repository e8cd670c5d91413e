//! Log output setup.
//!
//! Logs go to stderr so CLI output on stdout stays clean.

use tracing_subscriber::{fmt, EnvFilter};

/// Default filter when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "notes_bridge=info,tower_http=warn";

/// Install the global tracing subscriber. Safe to call more than once; later
/// calls are ignored.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
