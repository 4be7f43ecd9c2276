// src/exec/task_runner.rs

//! External task process runner.

use std::collections::VecDeque;
use std::process::Stdio;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info};

use crate::errors::Result;
use crate::exec::backend::{TaskExit, TaskRequest, TaskRunner};
use crate::queue::BoxFuture;

/// Stderr lines kept for the workitem's error trace.
const STDERR_TAIL_LINES: usize = 20;

/// Runs the task through the platform shell (`sh -c` / `cmd /C`).
///
/// The task blocks the caller for its whole runtime; there is no timeout.
#[derive(Debug, Clone, Default)]
pub struct ProcessTaskRunner;

impl ProcessTaskRunner {
    pub fn new() -> Self {
        Self
    }
}

impl TaskRunner for ProcessTaskRunner {
    fn run(&self, request: TaskRequest) -> BoxFuture<'_, Result<TaskExit>> {
        Box::pin(async move { Ok(run_process(request).await?) })
    }
}

async fn run_process(request: TaskRequest) -> anyhow::Result<TaskExit> {
    info!(cmd = %request.command, workdir = %request.workdir.display(), "starting task process");

    // Build a shell command appropriate for the platform.
    let mut cmd = if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(&request.command);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(&request.command);
        c
    };

    cmd.current_dir(&request.workdir)
        .envs(request.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd
        .spawn()
        .with_context(|| format!("spawning task process '{}'", request.command))?;

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    // Task output is informational; forward it to the log.
    let stdout_pump = tokio::spawn(async move {
        if let Some(stdout) = stdout {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                info!("{}", line);
            }
        }
    });

    // Always consume stderr so buffers don't fill; keep the tail for traces.
    let stderr_pump = tokio::spawn(async move {
        let mut tail = VecDeque::with_capacity(STDERR_TAIL_LINES);
        if let Some(stderr) = stderr {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!("stderr: {}", line);
                if tail.len() == STDERR_TAIL_LINES {
                    tail.pop_front();
                }
                tail.push_back(line);
            }
        }
        tail
    });

    let status = child
        .wait()
        .await
        .with_context(|| format!("waiting for task process '{}'", request.command))?;

    let _ = stdout_pump.await;
    let stderr_tail = stderr_pump.await.unwrap_or_default();

    let code = status.code().unwrap_or(-1);
    info!(exit_code = code, success = status.success(), "task process exited");

    Ok(TaskExit {
        code,
        stderr_tail: stderr_tail.into_iter().collect(),
    })
}
