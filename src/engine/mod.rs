// src/engine/mod.rs

//! Workitem lifecycle engine.
//!
//! - [`state_machine`]: pure `successful` / `retry` transition of a workitem.
//! - [`processor`]: one attempt (staging, payload, task, transition, upload).
//! - [`drain`]: pop-and-process until the queue reports empty.
//! - [`runtime`]: the async shell choosing when to drain (self-polling or
//!   notification-driven) and handling shutdown.

pub mod drain;
pub mod processor;
pub mod runtime;
pub mod state_machine;

pub use crate::config::DriveMode;
pub use drain::{drain, DrainSummary};
pub use processor::WorkitemProcessor;
pub use runtime::{spawn_drain_worker, Runtime};
pub use state_machine::{apply_outcome, Transition};

/// Runtime options shared by both driving modes.
#[derive(Debug, Clone, Copy)]
pub struct RuntimeOptions {
    /// Drain a single time and exit (used for `--once`).
    pub once: bool,
}

/// Events flowing into the runtime from outside the drain loop.
#[derive(Debug, Clone)]
pub enum RuntimeEvent {
    /// Graceful shutdown requested (e.g. Ctrl-C).
    ShutdownRequested,
}

/// Events sent by the notification-driven drain worker to the main loop.
#[derive(Debug, Clone)]
pub enum DrainEvent {
    Completed(DrainSummary),
    Failed(String),
}

