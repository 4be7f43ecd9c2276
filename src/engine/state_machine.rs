// src/engine/state_machine.rs

//! Terminal-state transition of a popped workitem.
//!
//! Pure and synchronous: no IO, no queue calls. The processor applies the
//! transition and then hands the workitem back to the queue service.

use tracing::{debug, warn};

use crate::exec::{ExecutionOutcome, TaskFailure};
use crate::payload;
use crate::workitem::{Workitem, WorkitemState};

/// Which terminal state (from this worker's point of view) was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// `state = successful`, error fields cleared.
    Succeeded,
    /// `state = retry`, all three error fields set.
    Retryable,
}

/// Apply `outcome` to `workitem`.
///
/// Exactly one of `successful` / `retry` is written, and the error fields are
/// set if and only if the state is `retry`. A success whose payload cannot be
/// re-encoded is turned into a retry.
pub fn apply_outcome(workitem: &mut Workitem, outcome: ExecutionOutcome) -> Transition {
    match outcome {
        ExecutionOutcome::Success { payload, name } => {
            annotate(workitem, name);
            match payload::encode(&payload) {
                Ok(raw) => {
                    workitem.payload = raw;
                    workitem.state = WorkitemState::Successful;
                    workitem.clear_error();
                    debug!(workitem = %workitem.id, "workitem successful");
                    Transition::Succeeded
                }
                Err(e) => mark_retry(workitem, TaskFailure::application(e)),
            }
        }
        ExecutionOutcome::Failure { failure, name } => {
            annotate(workitem, name);
            mark_retry(workitem, failure)
        }
    }
}

fn annotate(workitem: &mut Workitem, name: Option<String>) {
    if let Some(name) = name {
        workitem.name = name;
    }
}

fn mark_retry(workitem: &mut Workitem, failure: TaskFailure) -> Transition {
    warn!(
        workitem = %workitem.id,
        retries = workitem.retries,
        errortype = %failure.error_type,
        "{}",
        failure.message
    );
    workitem.state = WorkitemState::Retry;
    workitem.errortype = Some(failure.error_type);
    workitem.errormessage = Some(failure.message);
    workitem.errorsource = Some(failure.trace);
    Transition::Retryable
}
