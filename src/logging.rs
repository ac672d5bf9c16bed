use std::path::Path;
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling,
};
use tracing_subscriber::{
    EnvFilter,
    fmt,
};

pub const DEFAULT_FILTER: &str = "slot_spin=info";
pub const LOG_FILE_PREFIX: &str = "slot-spin.log";

/// Installs the global subscriber. `RUST_LOG` overrides the default filter.
///
/// With a `log_dir` the output goes to a daily rolling file and the returned
/// guard must be held until exit so buffered lines get flushed.
pub fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    match log_dir {
        Some(dir) => {
            let (writer, guard) = tracing_appender::non_blocking(rolling::daily(dir, LOG_FILE_PREFIX));
            let _ = fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .try_init();
            Some(guard)
        }
        None => {
            let _ = fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .try_init();
            None
        }
    }
}
