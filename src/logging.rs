//! Tracing setup: compact stdout output plus an append-only log file.
//!
//! `IMAGEINQUIRY_LOG_FILE` selects the file; without it logs land in `logs/imageinquiry.log`.
//! Filtering honours `RUST_LOG` and defaults to `info`.
use std::path::PathBuf;
use std::sync::OnceLock;

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const LOG_FILE_ENV: &str = "IMAGEINQUIRY_LOG_FILE";
const DEFAULT_LOG_DIR: &str = "logs";
const DEFAULT_LOG_FILE: &str = "imageinquiry.log";

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Where file logs are written.
#[derive(Debug, Clone, PartialEq, Eq)]
enum LogTarget {
    /// Explicit path supplied through the environment.
    File(PathBuf),
    /// Default file inside the working directory's `logs/` folder.
    DefaultDir,
}

fn log_target(explicit: Option<String>) -> LogTarget {
    match explicit.filter(|path| !path.trim().is_empty()) {
        Some(path) => LogTarget::File(PathBuf::from(path)),
        None => LogTarget::DefaultDir,
    }
}

/// Install the global tracing subscriber.
///
/// Must be called once, after configuration has been loaded.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stdout_layer = fmt::layer().with_target(false).compact();

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer);

    match open_file_writer(log_target(std::env::var(LOG_FILE_ENV).ok())) {
        Some(writer) => {
            let file_layer = fmt::layer()
                .with_writer(writer)
                .with_target(true)
                .with_ansi(false)
                .compact();
            registry.with(file_layer).init();
        }
        None => registry.init(),
    }
}

fn open_file_writer(target: LogTarget) -> Option<NonBlocking> {
    let (non_blocking, guard) = match target {
        LogTarget::File(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .map_err(|err| eprintln!("Failed to open log file {}: {err}", path.display()))
                .ok()?;
            tracing_appender::non_blocking(file)
        }
        LogTarget::DefaultDir => {
            std::fs::create_dir_all(DEFAULT_LOG_DIR)
                .map_err(|err| eprintln!("Failed to create logs directory: {err}"))
                .ok()?;
            tracing_appender::non_blocking(tracing_appender::rolling::never(
                DEFAULT_LOG_DIR,
                DEFAULT_LOG_FILE,
            ))
        }
    };
    let _ = LOG_GUARD.set(guard);
    Some(non_blocking)
}
