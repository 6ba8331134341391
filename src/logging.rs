//! Tracing setup for the analysis server.
//!
//! Events go to a compact stdout layer and, when the log file can be opened, to an appended
//! file at `DOCINSIGHT_LOG_FILE` (default `logs/docinsight.log`). `RUST_LOG` controls
//! filtering and defaults to `info`.
use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::processing::PipelineSettings;

const LOG_FILE_ENV: &str = "DOCINSIGHT_LOG_FILE";
const DEFAULT_LOG_FILE: &str = "logs/docinsight.log";

static FILE_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Install the global subscriber and return the log file path when file output is active.
pub fn init_tracing() -> Option<PathBuf> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let path = log_file_path(std::env::var(LOG_FILE_ENV).ok());

    let file_layer = match open_log_writer(&path) {
        Ok(writer) => Some(
            fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .compact(),
        ),
        Err(err) => {
            eprintln!("File logging disabled; cannot open {}: {err}", path.display());
            None
        }
    };
    let active = file_layer.is_some().then_some(path);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .with(file_layer)
        .init();

    active
}

/// Record the limits every batch will run under.
pub fn log_startup(settings: &PipelineSettings, log_file: Option<&Path>) {
    tracing::info!(
        chunk_size = settings.chunk_size,
        call_timeout = ?settings.call_timeout,
        deep_tier_timeout = ?settings.deep_tier_timeout,
        batch_timeout = ?settings.batch_timeout,
        max_file_bytes = settings.max_file_bytes,
        log_file = ?log_file,
        "Analysis pipeline ready"
    );
}

fn log_file_path(configured: Option<String>) -> PathBuf {
    configured
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| DEFAULT_LOG_FILE.to_string())
        .into()
}

fn open_log_writer(path: &Path) -> io::Result<NonBlocking> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let (writer, guard) = tracing_appender::non_blocking(file);
    let _ = FILE_GUARD.set(guard);
    Ok(writer)
}
