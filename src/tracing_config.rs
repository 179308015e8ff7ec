use tracing_subscriber::EnvFilter;

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initialize the tracing subscriber: env-filtered, RFC 3339 UTC timestamps, stdout.
pub fn init() {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_timer(tracing_subscriber::fmt::time::ChronoUtc::rfc_3339())
        .init();
}
