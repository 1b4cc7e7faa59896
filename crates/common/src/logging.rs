use tracing_subscriber::{fmt, EnvFilter};

fn filter_or(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Installs the process-wide subscriber writing to stderr. Later calls are no-ops.
pub fn init_logging(default_level: &str) {
    let _ = fmt()
        .with_env_filter(filter_or(default_level))
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Subscriber for test binaries: output is captured per test and repeated
/// initialisation is ignored.
pub fn init_test_logging() {
    let _ = fmt()
        .with_env_filter(filter_or("debug"))
        .with_test_writer()
        .try_init();
}
