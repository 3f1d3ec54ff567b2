/// Logger setup and error-chain formatting shared by both binaries.

use std::error::Error;

/// Initializes `env_logger` with an `info` default, overridable via `RUST_LOG`.
/// Safe to call more than once.
pub fn init_logger() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_secs()
        .try_init();
}

/// Renders `err` followed by each of its sources, one per line.
pub fn format_error_chain(err: &dyn Error) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        out.push_str("\n  caused by: ");
        out.push_str(&cause.to_string());
        source = cause.source();
    }
    out
}

/// Logs `err` and its full cause chain at error level.
pub fn log_error_chain(context: &str, err: &dyn Error) {
    log::error!("{}: {}", context, format_error_chain(err));
}
