//! Log output: everything at the `RUST_LOG` level (default info) on stderr,
//! warnings and errors appended to `error.log` beside the config file.
//!
//! Stdout is left alone; the screen-reader speech sink owns it.

use std::io;
use std::path::{Path, PathBuf};
use tracing::Subscriber;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

pub const LOG_FILE_NAME: &str = "error.log";

/// Flushes the log file when dropped. Keep it alive for the whole run.
pub struct LoggingGuard {
    _file_guard: WorkerGuard,
}

/// Directory holding `config_path`, where the error log goes too.
pub fn log_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn file_layer<S>(dir: &Path) -> io::Result<(impl Layer<S>, WorkerGuard)>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    let appender = RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(LOG_FILE_NAME)
        .build(dir)
        .map_err(io::Error::other)?;
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let layer = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_filter(LevelFilter::WARN);
    Ok((layer, guard))
}

/// Install the global subscriber. If the log file can't be opened, logging
/// carries on with stderr only and `None` is returned.
pub fn init_logging(dir: &Path) -> Option<LoggingGuard> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stderr)
        .with_filter(env_filter);

    let (file, guard, failure) = match file_layer::<Registry>(dir) {
        Ok((layer, guard)) => (Some(layer), Some(guard), None),
        Err(e) => (None, None, Some(e)),
    };

    tracing_subscriber::registry()
        .with(file)
        .with(stderr_layer)
        .init();

    if let Some(e) = failure {
        tracing::warn!(dir = %dir.display(), "cannot open {LOG_FILE_NAME}, logging to stderr only: {e}");
    }
    guard.map(|g| LoggingGuard { _file_guard: g })
}
