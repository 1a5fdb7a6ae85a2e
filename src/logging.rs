use chrono::{Datelike, Local};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Daily log file name inside `log_path`.
pub fn log_file_name() -> String {
    let today = Local::now();
    format!(
        "blob_sync_{:02}_{:02}_{}.log",
        today.day(),
        today.month(),
        today.year()
    )
}

/// Initializes tracing: stderr always, plus a file under `log_path` when set.
///
/// Stdout is left to command output (`count` prints its result there).
/// Keep the returned guard alive until exit so the file writer flushes.
pub fn init_logging(log_path: &str) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if log_path.is_empty() {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
        return None;
    }

    let file_appender = tracing_appender::rolling::never(log_path, log_file_name());
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_ansi(false).with_writer(non_blocking))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
    Some(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_file_name_is_dated() {
        let name = log_file_name();
        assert!(name.starts_with("blob_sync_"));
        assert!(name.ends_with(".log"));
        assert_eq!(name.len(), "blob_sync_dd_mm_yyyy.log".len());
    }
}
