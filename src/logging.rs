use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Sends log records to a daily rolling file under `directory`. The terminal
/// belongs to the UI, so nothing is written to stdout or stderr.
///
/// Hold on to the returned guard until exit so buffered records get flushed.
pub fn initialize_logging(directory: &Path, debug: bool) -> WorkerGuard {
    // Create the log directory if it doesn't exist
    let _ = std::fs::create_dir_all(directory);

    let file_appender = tracing_appender::rolling::daily(directory, "woeplanet-map.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();

    tracing_subscriber::registry()
        .with(EnvFilter::new(filter_directives(rust_log.as_deref(), debug)))
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();

    tracing::info!("Logging initialized successfully.");
    guard
}

/// `RUST_LOG` wins when set; otherwise `info`, or `debug` with `--debug`.
fn filter_directives(rust_log: Option<&str>, debug: bool) -> String {
    match rust_log.map(str::trim).filter(|s| !s.is_empty()) {
        Some(directives) => directives.to_string(),
        None if debug => "debug".to_string(),
        None => "info".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rust_log_overrides_default_level() {
        assert_eq!(filter_directives(Some("warn"), false), "warn");
        assert_eq!(filter_directives(Some("woeplanet_map=trace"), true), "woeplanet_map=trace");
    }

    #[test]
    fn default_level_follows_debug_flag() {
        assert_eq!(filter_directives(None, false), "info");
        assert_eq!(filter_directives(None, true), "debug");
        assert_eq!(filter_directives(Some("  "), true), "debug");
    }
}
