use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber
///
/// Logs go to stderr. `RUST_LOG` wins when set; otherwise the level is
/// `warn`, or `debug` when `verbose` is true. Calling this twice is a no-op.
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
