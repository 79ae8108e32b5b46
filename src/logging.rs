//! File logging. The terminal belongs to the UI, so nothing is written to
//! stdout or stderr.

use anyhow::Context;
use std::fs;
use std::path::Path;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const LOG_FILE_PREFIX: &str = "tunewidget";
const DEFAULT_FILTER: &str = "tunewidget=debug,warn";

/// Installs the global subscriber writing daily-rotated files under `dir`.
/// `RUST_LOG` overrides the default filter.
pub fn init_logging(dir: &Path) -> anyhow::Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;

    let file_appender = RollingFileAppender::new(Rotation::DAILY, dir, LOG_FILE_PREFIX);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    // flushes on drop; must outlive the process
    Box::leak(Box::new(guard));

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let fmt_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .context("a global logger is already installed")?;

    tracing::info!("logging to {}", dir.display());
    Ok(())
}
