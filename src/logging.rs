// src/logging.rs

//! Logging setup for `wiqrunner` using `tracing` + `tracing-subscriber`.
//!
//! Priority for determining the log level:
//! 1. `--log-level` CLI flag (if provided)
//! 2. `loglevel` environment variable (e.g. "info", "debug", or "10")
//! 3. default to `info`
//!
//! At `info` each line is just the message; every other level also prints
//! the level name. Logs go to STDERR so stdout stays free for task output.

use anyhow::Result;
use tracing_subscriber::fmt;

use crate::cli::LogLevel;

/// Initialise global logging subscriber.
///
/// Safe to call once at startup.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let level = match cli_level {
        Some(lvl) => level_from_log_level(lvl),
        None => std::env::var("loglevel")
            .ok()
            .and_then(|s| parse_level_str(&s))
            .unwrap_or(tracing::Level::INFO),
    };

    let verbose = level != tracing::Level::INFO;

    fmt()
        .with_max_level(level)
        .with_level(verbose)
        .with_target(verbose)
        .without_time()
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .init();

    Ok(())
}

fn level_from_log_level(lvl: LogLevel) -> tracing::Level {
    match lvl {
        LogLevel::Error => tracing::Level::ERROR,
        LogLevel::Warn => tracing::Level::WARN,
        LogLevel::Info => tracing::Level::INFO,
        LogLevel::Debug => tracing::Level::DEBUG,
        LogLevel::Trace => tracing::Level::TRACE,
    }
}

/// Parse a `loglevel` value.
///
/// Accepts level names and the numeric levels used by Python's `logging`
/// module, which existing deployments still set.
pub fn parse_level_str(s: &str) -> Option<tracing::Level> {
    match s.trim().to_lowercase().as_str() {
        "error" | "critical" | "40" | "50" => Some(tracing::Level::ERROR),
        "warn" | "warning" | "30" => Some(tracing::Level::WARN),
        "info" | "20" => Some(tracing::Level::INFO),
        "debug" | "10" => Some(tracing::Level::DEBUG),
        "trace" | "0" => Some(tracing::Level::TRACE),
        _ => None,
    }
}
