// src/exec/mod.rs

//! External task execution layer.
//!
//! - [`backend`] provides the `TaskRunner` trait that actually runs the
//!   external program. Production uses [`ProcessTaskRunner`]; tests can swap
//!   in a fake implementation.
//! - [`task_runner`] runs the task as an OS process via
//!   `tokio::process::Command`.
//! - [`executor`] is the adapter between a decoded payload and a runner: it
//!   injects recognized payload fields into the task environment and turns
//!   the exit status into an [`ExecutionOutcome`].

pub mod backend;
pub mod executor;
pub mod task_runner;

pub use backend::{TaskExit, TaskRequest, TaskRunner};
pub use executor::{ExecutionOutcome, TaskExecutor, TaskFailure};
pub use task_runner::ProcessTaskRunner;
