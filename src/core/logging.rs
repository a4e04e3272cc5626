//! Logging setup
//!
//! Console output at the configured level plus a persistent, append-only
//! log file at DEBUG that keeps every attempt and teardown step.

use std::fs;
use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::core::config::LoggingConfig;
use crate::core::error::{MutualsError, Result};

/// Third-party targets that flood DEBUG output
const QUIET_TARGETS: &str = "chromiumoxide=warn,tungstenite=warn,hyper=warn,hyper_util=warn,reqwest=warn";

/// Install the global subscriber.
///
/// The returned guard flushes the file writer when dropped; keep it alive
/// for the lifetime of the process.
pub fn init(config: &LoggingConfig, debug: bool) -> Result<WorkerGuard> {
    let path = config.file.as_path();
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file_name = path
        .file_name()
        .ok_or_else(|| MutualsError::config("log file path has no file name"))?;
    fs::create_dir_all(dir)?;

    let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(
        dir, file_name,
    ));

    let console_level = if debug {
        "debug"
    } else {
        config.console_level.as_str()
    };
    let console_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},{}", console_level, QUIET_TARGETS)));
    let file_filter = EnvFilter::new(format!("debug,{}", QUIET_TARGETS));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_filter(console_filter))
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_writer(writer)
                .with_filter(file_filter),
        )
        .try_init()
        .map_err(|e| MutualsError::config(format!("Failed to initialise logging: {}", e)))?;

    Ok(guard)
}
