use std::path::Path;

use scrapyard_core::{Error, ErrorKind, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Holds the non-blocking file-appender guard. Must be kept alive for the
/// process lifetime; dropping it flushes and closes the log file.
pub struct LoggingGuard {
    _guard: WorkerGuard,
}

/// Initializes the global subscriber: a console `fmt` layer gated by
/// `RUST_LOG` (raised to `debug` when `debug` is set, otherwise `info`), and
/// a JSON file layer rotated daily under `log_dir`.
pub fn init(log_dir: &Path, debug: bool) -> Result<LoggingGuard> {
    std::fs::create_dir_all(log_dir).map_err(|e| {
        Error::with_source(
            ErrorKind::Configuration,
            format!("failed to create log directory '{}'", log_dir.display()),
            Box::new(e),
        )
    })?;

    let default_level = if debug { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let file_appender = tracing_appender::rolling::daily(log_dir, "scrapyard.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let json_layer = tracing_subscriber::fmt::layer().json().with_writer(non_blocking);
    let console_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(console_layer)
        .init();

    Ok(LoggingGuard { _guard: guard })
}
