//! Process-wide logging: console plus a size-rotated log file.

use std::io;
use std::path::Path;

use file_rotate::compression::Compression;
use file_rotate::suffix::AppendCount;
use file_rotate::{ContentLimit, FileRotate};
use tracing::Subscriber;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{fmt, prelude::*, EnvFilter, Layer};

use crate::config::ApiConfig;

/// Filter used when `RUST_LOG` is unset or empty.
pub const DEFAULT_FILTER: &str = "mnist_api=info,mnist_inference=info";

/// Log file writer that rotates once the file grows past `max_bytes`,
/// keeping `backups` numbered copies (`<file>.1` is the newest).
///
/// The parent directory is created if missing.
pub fn rotating_file(
    path: &Path,
    max_bytes: usize,
    backups: usize,
) -> io::Result<FileRotate<AppendCount>> {
    if path.file_name().is_none() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("Log file path {} has no file name", path.display()),
        ));
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    Ok(FileRotate::new(
        path,
        AppendCount::new(backups),
        ContentLimit::BytesSurpassed(max_bytes),
        Compression::None,
        #[cfg(unix)]
        None,
    ))
}

/// Build the level filter from a `RUST_LOG` value, falling back to
/// [`DEFAULT_FILTER`] when it is unset, empty or unparseable.
pub fn env_filter(rust_log: Option<&str>) -> EnvFilter {
    rust_log
        .filter(|s| !s.trim().is_empty())
        .and_then(|s| EnvFilter::try_new(s).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_FILTER))
}

/// Plain-text file layer: timestamp, level, target, message.
pub fn file_layer<S, W>(writer: W) -> impl Layer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true)
}

/// Install the global subscriber.
///
/// The returned guard flushes the file writer on drop and must be held for
/// the lifetime of the process.
pub fn init_tracing(config: &ApiConfig) -> anyhow::Result<WorkerGuard> {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let env_filter = env_filter(rust_log.as_deref());

    let file = rotating_file(&config.log_file, config.log_max_bytes, config.log_backup_count)?;
    let (file_writer, guard) = tracing_appender::non_blocking(file);

    // Colored output for dev, JSON for production
    let json_console = config.log_json.then(|| fmt::layer().json());
    let text_console = (!config.log_json).then(|| {
        fmt::layer()
            .with_ansi(true)
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_console)
        .with(text_console)
        .with(file_layer(file_writer))
        .try_init()?;

    Ok(guard)
}
