//! Diagnostic log setup.

use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter directives.
pub const LOG_ENV: &str = "CODEGENIE_LOG";

const DEFAULT_FILTER: &str = "warn";

/// Installs a stderr fmt subscriber filtered by `CODEGENIE_LOG`.
///
/// Falls back to `warn` when the variable is unset or invalid. Calling this
/// more than once is harmless.
pub fn init_logging() {
    let filter = std::env::var(LOG_ENV)
        .ok()
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_FILTER));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
