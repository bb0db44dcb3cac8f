//! Logging setup.
//!
//! Writes to a log file (truncated on start) and to stdout. The filter
//! defaults to `info` and follows `RUST_LOG` when set.

use std::fs;
use std::io;
use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Keeps the file writer alive. Dropping it flushes the log file.
pub struct LoggingGuard {
    _file_guard: WorkerGuard,
}

/// Installs the global subscriber.
///
/// Creates `log_dir` if needed and empties `log_file` inside it.
///
/// # Errors
///
/// Fails when the directory cannot be created or the file cannot be
/// truncated.
pub fn init_logging(log_dir: impl AsRef<Path>, log_file: &str) -> Result<LoggingGuard, io::Error> {
    let log_dir = log_dir.as_ref();
    prepare_log_file(log_dir, log_file)?;

    let file_appender = tracing_appender::rolling::never(log_dir, log_file);
    let (non_blocking_file, file_guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking_file)
        .with_ansi(false)
        .with_target(true);

    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stdout)
        .with_ansi(true)
        .compact();

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stdout_layer)
        .init();

    Ok(LoggingGuard {
        _file_guard: file_guard,
    })
}

fn prepare_log_file(log_dir: &Path, log_file: &str) -> io::Result<()> {
    fs::create_dir_all(log_dir)?;
    fs::write(log_dir.join(log_file), "")
}

/// Default log directory, `~/.ogcterrain/logs`, or `logs` without a home.
pub fn default_log_dir() -> std::path::PathBuf {
    dirs::home_dir()
        .map(|home| home.join(".ogcterrain").join("logs"))
        .unwrap_or_else(|| "logs".into())
}

pub fn default_log_file() -> &'static str {
    "ogcterrain.log"
}
