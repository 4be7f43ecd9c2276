// src/engine/processor.rs

//! One processing attempt for one popped workitem.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{error, info};

use crate::engine::state_machine::{apply_outcome, Transition};
use crate::errors::Result;
use crate::exec::{ExecutionOutcome, TaskExecutor};
use crate::payload;
use crate::queue::QueueClient;
use crate::staging::{DirectorySnapshot, FileStager};
use crate::workitem::Workitem;

/// Runs the full attempt: snapshot, inbound files, decode, execute,
/// transition, upload, cleanup.
pub struct WorkitemProcessor {
    queue: Arc<dyn QueueClient>,
    stager: FileStager,
    executor: TaskExecutor,
}

impl fmt::Debug for WorkitemProcessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkitemProcessor")
            .field("stager", &self.stager)
            .field("executor", &self.executor)
            .finish_non_exhaustive()
    }
}

impl WorkitemProcessor {
    pub fn new(queue: Arc<dyn QueueClient>, stager: FileStager, executor: TaskExecutor) -> Self {
        Self {
            queue,
            stager,
            executor,
        }
    }

    pub fn queue(&self) -> &dyn QueueClient {
        self.queue.as_ref()
    }

    /// Process `workitem` and hand it back to the queue service.
    ///
    /// Every failure inside the attempt becomes a `retry` transition. Only
    /// the snapshot of the working directory and the update call itself can
    /// return `Err`; both are outside the attempt.
    pub async fn process(&self, mut workitem: Workitem) -> Result<Transition> {
        info!(
            workitem = %workitem.id,
            retries = workitem.retries,
            "Processing workitem id {} retry #{}",
            workitem.id,
            workitem.retries
        );

        let before = self.stager.snapshot()?;
        let outcome = self.attempt(&workitem).await;
        let transition = apply_outcome(&mut workitem, outcome);

        // Same hand-off for both transitions.
        self.hand_off(&workitem, &before).await?;
        Ok(transition)
    }

    async fn attempt(&self, workitem: &Workitem) -> ExecutionOutcome {
        let queue = Arc::clone(&self.queue);
        let download = |id: String| {
            let queue = Arc::clone(&queue);
            async move { queue.download_file(&id).await }
        };

        if let Err(e) = self.stager.materialize_inbound(&workitem.files, download).await {
            return ExecutionOutcome::failed(e);
        }

        let payload = match payload::decode(&workitem.payload) {
            Ok(p) => p,
            Err(e) => return ExecutionOutcome::failed(e),
        };

        self.executor.execute(payload).await
    }

    async fn hand_off(&self, workitem: &Workitem, before: &DirectorySnapshot) -> Result<()> {
        let outbound: Vec<PathBuf> = match self.stager.collect_outbound(before) {
            Ok(files) => files,
            Err(e) => {
                error!(workitem = %workitem.id, error = %e, "failed to list outbound files; updating without attachments");
                Vec::new()
            }
        };

        self.queue.update_workitem(workitem, &outbound, true).await?;
        self.stager.cleanup(&outbound);
        Ok(())
    }
}
