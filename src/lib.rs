// src/lib.rs

pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod payload;
pub mod queue;
pub mod staging;
pub mod workitem;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::{load_and_validate, ConfigFile, DriveMode};
use crate::engine::{Runtime, RuntimeEvent, RuntimeOptions, WorkitemProcessor};
use crate::exec::{ProcessTaskRunner, TaskExecutor, TaskRunner};
use crate::fs::{FileSystem, RealFileSystem};
use crate::queue::{MemoryQueueClient, QueueClient};
use crate::staging::FileStager;
use crate::workitem::Workitem;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading (file + environment)
/// - the queue client (in-process service, optionally seeded)
/// - file stager, task executor and workitem processor
/// - the runtime in the configured driving mode
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let cfg = load_and_validate(&args.config)?;

    if args.dry_run {
        print_dry_run(&cfg)?;
        return Ok(());
    }

    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
    let queue = Arc::new(
        MemoryQueueClient::new(Arc::clone(&fs)).with_max_retries(cfg.queue.max_retries),
    );

    if let Some(ref seed) = args.seed {
        let count = seed_queue(&queue, cfg.wiq(), Path::new(seed))?;
        info!(wiq = %cfg.wiq(), count, "seeded workitem queue from {}", seed);
    }

    let processor = build_processor(
        &cfg,
        Arc::clone(&queue) as Arc<dyn QueueClient>,
        fs,
        Arc::new(ProcessTaskRunner::new()),
    );

    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(8);

    // Ctrl-C → graceful shutdown.
    {
        let tx = rt_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            let _ = tx.send(RuntimeEvent::ShutdownRequested).await;
        });
    }

    let options = RuntimeOptions { once: args.once };
    let runtime = Runtime::new(
        Arc::new(processor),
        cfg.wiq(),
        cfg.drive_mode(),
        options,
        rt_rx,
    );
    let totals = runtime.run().await?;
    debug!(?totals, "runtime finished");

    if args.once && args.seed.is_some() {
        let records = serde_json::to_string_pretty(&queue.records())?;
        println!("{records}");
    }

    Ok(())
}

/// Assemble the processor for a configuration.
///
/// The queue client, filesystem and task runner are injected so tests can
/// substitute fakes for any of them.
pub fn build_processor(
    cfg: &ConfigFile,
    queue: Arc<dyn QueueClient>,
    fs: Arc<dyn FileSystem>,
    runner: Arc<dyn TaskRunner>,
) -> WorkitemProcessor {
    let stager = FileStager::new(fs, cfg.task.workdir.clone());
    let executor = TaskExecutor::new(
        runner,
        cfg.task.cmd.clone(),
        cfg.task.workdir.clone(),
        cfg.task.completion_label.clone(),
    );
    WorkitemProcessor::new(queue, stager, executor)
}

/// Load a JSON array of workitems into `queue` on `wiq`.
pub fn seed_queue(queue: &MemoryQueueClient, wiq: &str, path: &Path) -> Result<usize> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("reading seed file {:?}", path))?;
    let workitems: Vec<Workitem> = serde_json::from_str(&contents)
        .with_context(|| format!("parsing seed file {:?}", path))?;

    let count = workitems.len();
    for workitem in workitems {
        queue.push_workitem(wiq, workitem);
    }
    Ok(count)
}

/// Simple dry-run output: resolved config and driving mode.
fn print_dry_run(cfg: &ConfigFile) -> Result<()> {
    println!("wiqrunner dry-run");
    match cfg.drive_mode() {
        DriveMode::SelfPolling { interval } => {
            println!("  mode = self-polling (every {}s)", interval.as_secs());
        }
        DriveMode::EventDriven { queue, idle_tick } => {
            println!(
                "  mode = event-driven (queue {queue}, idle tick {}s)",
                idle_tick.as_secs()
            );
        }
    }
    println!();
    print!("{}", toml::to_string_pretty(cfg)?);

    debug!("dry-run complete (no queue access)");
    Ok(())
}
