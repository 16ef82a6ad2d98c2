//! File-based logging.
//!
//! The terminal belongs to the TUI, so tracing output goes to a daily rolling
//! file under the state directory instead of stderr.

use std::path::{Path, PathBuf};

use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{LoggingSettings, default_state_dir};
use crate::error::{Error, Result};

const LOG_FILE_PREFIX: &str = "riffle.log";

/// Resolve the log directory from settings, else the XDG state dir.
pub fn log_dir(settings: &LoggingSettings) -> Option<PathBuf> {
    settings.dir.clone().or_else(default_state_dir)
}

/// Filter from `RUST_LOG`, else the configured default.
fn filter(settings: &LoggingSettings) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.filter))
        .unwrap_or_else(|_| EnvFilter::new("riffle=info,warn"))
}

/// Install the global subscriber. Returns the directory logs go to.
pub fn init(settings: &LoggingSettings) -> Result<PathBuf> {
    let dir = log_dir(settings)
        .ok_or_else(|| Error::Logging("no HOME or XDG_STATE_HOME to place logs in".into()))?;
    init_in(&dir, filter(settings))?;
    Ok(dir)
}

fn init_in(dir: &Path, filter: EnvFilter) -> Result<()> {
    std::fs::create_dir_all(dir)?;

    let file_appender = RollingFileAppender::new(Rotation::DAILY, dir, LOG_FILE_PREFIX);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    // The writer flushes on guard drop; keep it for the whole process.
    Box::leak(Box::new(guard));

    let fmt_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| Error::Logging(e.to_string()))?;

    tracing::info!(dir = %dir.display(), "logging initialized");
    Ok(())
}
