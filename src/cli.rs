// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `wiqrunner`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "wiqrunner",
    version,
    about = "Drain a workitem queue, running an external task for every workitem.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// A missing file at the default location means "use defaults".
    #[arg(long, value_name = "PATH", default_value = "wiqrunner.toml")]
    pub config: String,

    /// Drain the workitem queue a single time and exit.
    #[arg(long)]
    pub once: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, the `loglevel` environment variable or `info` is used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// JSON file with an array of workitems to load into the in-process
    /// queue service before starting.
    #[arg(long, value_name = "PATH")]
    pub seed: Option<String>,

    /// Resolve and print the configuration, but don't touch the queue.
    #[arg(long)]
    pub dry_run: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
