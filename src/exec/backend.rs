// src/exec/backend.rs

//! Pluggable task runner abstraction.
//!
//! The executor adapter talks to a `TaskRunner` instead of spawning processes
//! itself, so tests can replace the external program with a fake that records
//! requests, writes files and returns scripted exit codes.

use std::path::PathBuf;

use crate::errors::Result;
use crate::queue::BoxFuture;

/// Everything a runner needs to start one external task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRequest {
    /// Shell command line.
    pub command: String,
    /// Working directory; outputs are expected here.
    pub workdir: PathBuf,
    /// Variables added to the task's environment.
    pub env: Vec<(String, String)>,
}

impl TaskRequest {
    pub fn env_var(&self, key: &str) -> Option<&str> {
        self.env
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// How an external task finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskExit {
    /// Exit code; `-1` when the process was terminated by a signal.
    pub code: i32,
    /// Last lines the task wrote to stderr, oldest first.
    pub stderr_tail: Vec<String>,
}

impl TaskExit {
    pub fn success(&self) -> bool {
        self.code == 0
    }
}

/// Trait abstracting how the external task is run.
///
/// `Err` means the task could not be run at all (e.g. spawn failure); a task
/// that ran and failed is an `Ok(TaskExit)` with a non-zero code.
pub trait TaskRunner: Send + Sync {
    fn run(&self, request: TaskRequest) -> BoxFuture<'_, Result<TaskExit>>;
}
