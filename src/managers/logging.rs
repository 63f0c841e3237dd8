//! Logging setup
//!
//! Console output goes to stdout as text or JSON lines. When a log directory
//! is configured, a daily rotated file copy is written as well.

use crate::config::{expand_tilde, LogFormat, LogSettings};
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn, Level};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

const LOG_FILE_PREFIX: &str = "dbstash";

/// Map a LOG_LEVEL value to a tracing level, defaulting to INFO
pub fn parse_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" | "warning" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// Initialize logging from settings
///
/// The returned guard must be kept alive for the duration of the program;
/// dropping it flushes the file writer.
pub fn init_logging(settings: &LogSettings) -> Result<LogGuard> {
    let level = parse_level(&settings.level);

    let console_layer = match settings.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_writer(std::io::stdout)
            .with_target(false)
            .with_filter(level_filter(level))
            .boxed(),
        LogFormat::Text => fmt::layer()
            .with_writer(std::io::stdout)
            .with_target(false)
            .with_filter(level_filter(level))
            .boxed(),
    };

    let mut file_guard = None;
    let file_layer = match &settings.directory {
        Some(dir) => {
            let log_dir = expand_tilde(dir);
            fs::create_dir_all(&log_dir)
                .with_context(|| format!("Failed to create log directory: {:?}", log_dir))?;

            let appender = RollingFileAppender::new(
                Rotation::DAILY,
                &log_dir,
                format!("{}.log", LOG_FILE_PREFIX),
            );
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            file_guard = Some(guard);

            cleanup_old_logs(&log_dir, settings.max_files)?;

            Some(
                fmt::layer()
                    .json()
                    .with_writer(non_blocking)
                    .with_ansi(false)
                    .with_filter(level_filter(level)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(LogGuard {
        _file_guard: file_guard,
    })
}

/// RUST_LOG overrides the configured level
fn level_filter(level: Level) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()))
}

/// Delete rotated log files beyond the newest `max_files`.
///
/// Daily rotation names files `dbstash.log.YYYY-MM-DD`, so name order is
/// age order.
fn cleanup_old_logs(log_dir: &Path, max_files: u32) -> Result<()> {
    let prefix = format!("{}.log", LOG_FILE_PREFIX);
    let mut rotated: Vec<PathBuf> = fs::read_dir(log_dir)
        .with_context(|| format!("Failed to list log directory: {:?}", log_dir))?
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with(&prefix))
        })
        .collect();
    rotated.sort_unstable_by(|a, b| b.cmp(a));

    for stale in rotated.iter().skip(max_files as usize) {
        match fs::remove_file(stale) {
            Ok(()) => debug!("Removed rotated log {:?}", stale),
            Err(e) => warn!("Could not remove rotated log {:?}: {}", stale, e),
        }
    }
    Ok(())
}

/// Keeps the file writer alive; flushes on drop
pub struct LogGuard {
    _file_guard: Option<WorkerGuard>,
}
