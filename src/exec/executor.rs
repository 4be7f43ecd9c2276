// src/exec/executor.rs

//! Adapter between a decoded payload and the external task.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, warn};

use crate::errors::{Result, WorkerError};
use crate::exec::backend::{TaskExit, TaskRequest, TaskRunner};
use crate::payload::{self, Payload};
use crate::workitem::ErrorType;

/// Payload fields copied into the task environment, under the same name.
///
/// Only `url` is recognized. The variable is scoped to the task process.
pub const ENV_FIELDS: &[&str] = &["url"];

/// Why a workitem attempt failed, in the shape the queue service stores it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskFailure {
    pub error_type: ErrorType,
    /// One-line summary (`errormessage`).
    pub message: String,
    /// Full diagnostic text (`errorsource`).
    pub trace: String,
}

impl TaskFailure {
    /// Classify any error raised during an attempt.
    ///
    /// Everything this worker can observe is an `application` error, which
    /// the queue service may redeliver. `business` is reserved for
    /// rejections that must never be retried.
    pub fn application(error: WorkerError) -> Self {
        let message = error.to_string();
        let trace = format!("{:?}", anyhow::Error::from(error));
        Self {
            error_type: ErrorType::Application,
            message,
            trace,
        }
    }

    fn from_exit(command: &str, exit: &TaskExit) -> Self {
        let error = WorkerError::TaskExecution(format!(
            "task '{command}' failed with exit code {}",
            exit.code
        ));
        let mut failure = Self::application(error);
        if !exit.stderr_tail.is_empty() {
            failure.trace.push_str("\n\nstderr (last lines):\n");
            failure.trace.push_str(&exit.stderr_tail.join("\n"));
        }
        failure
    }
}

/// Result of one attempt at running the external task.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionOutcome {
    Success {
        payload: Payload,
        /// Annotation for the workitem's `name`, if any.
        name: Option<String>,
    },
    Failure {
        failure: TaskFailure,
        name: Option<String>,
    },
}

impl ExecutionOutcome {
    /// Failure raised before or around the task (decode, staging, spawn).
    pub fn failed(error: WorkerError) -> Self {
        ExecutionOutcome::Failure {
            failure: TaskFailure::application(error),
            name: None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionOutcome::Success { .. })
    }
}

/// Runs the configured task for one decoded payload.
#[derive(Clone)]
pub struct TaskExecutor {
    runner: Arc<dyn TaskRunner>,
    command: String,
    workdir: PathBuf,
    completion_label: String,
}

impl std::fmt::Debug for TaskExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskExecutor")
            .field("command", &self.command)
            .field("workdir", &self.workdir)
            .finish_non_exhaustive()
    }
}

impl TaskExecutor {
    pub fn new(
        runner: Arc<dyn TaskRunner>,
        command: impl Into<String>,
        workdir: impl Into<PathBuf>,
        completion_label: impl Into<String>,
    ) -> Self {
        Self {
            runner,
            command: command.into(),
            workdir: workdir.into(),
            completion_label: completion_label.into(),
        }
    }

    /// Run the task once.
    ///
    /// Exit code 0 is a success carrying the payload; a non-zero exit, a
    /// runner error or a non-string environment field is an `application`
    /// failure. Whenever the task actually
    /// ran, the outcome carries the completion label for the workitem name.
    pub async fn execute(&self, payload: Payload) -> ExecutionOutcome {
        let env = match task_env(&payload) {
            Ok(env) => env,
            Err(e) => return ExecutionOutcome::failed(e),
        };
        let request = TaskRequest {
            command: self.command.clone(),
            workdir: self.workdir.clone(),
            env,
        };

        match self.runner.run(request).await {
            Ok(exit) if exit.success() => ExecutionOutcome::Success {
                payload,
                name: Some(self.completion_label.clone()),
            },
            Ok(exit) => {
                warn!(exit_code = exit.code, cmd = %self.command, "task failed");
                ExecutionOutcome::Failure {
                    failure: TaskFailure::from_exit(&self.command, &exit),
                    name: Some(self.completion_label.clone()),
                }
            }
            Err(e) => {
                warn!(error = %e, cmd = %self.command, "task could not be run");
                ExecutionOutcome::failed(e)
            }
        }
    }
}

/// Environment variables derived from recognized payload fields.
///
/// Fails if a recognized field is present but not a string.
pub fn task_env(payload: &Payload) -> Result<Vec<(String, String)>> {
    let mut env = Vec::new();
    for key in ENV_FIELDS {
        if let Some(value) = payload::string_field(payload, key)? {
            info!("setting task environment {}={}", key, value);
            env.push((key.to_string(), value.to_string()));
        }
    }
    Ok(env)
}
