use tracing_subscriber::EnvFilter;

pub const DEFAULT_LOG_FILTER: &str = "fssai_rag=info,tower_http=info";

/// Installs the global subscriber, honouring `RUST_LOG`. Only `main` calls this.
pub fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    // try_init: a second call is a no-op instead of a panic
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .try_init();
}
