// src/engine/drain.rs

use tracing::info;

use crate::engine::processor::WorkitemProcessor;
use crate::engine::state_machine::Transition;
use crate::errors::Result;

/// Counts for one drain cycle (or the sum of several).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainSummary {
    pub processed: usize,
    pub succeeded: usize,
    pub retried: usize,
}

impl DrainSummary {
    pub fn record(&mut self, transition: Transition) {
        self.processed += 1;
        match transition {
            Transition::Succeeded => self.succeeded += 1,
            Transition::Retryable => self.retried += 1,
        }
    }

    pub fn merge(&mut self, other: DrainSummary) {
        self.processed += other.processed;
        self.succeeded += other.succeeded;
        self.retried += other.retried;
    }
}

/// Pop and process workitems from `wiq` until the queue reports empty.
///
/// Stops at the first empty pop. Workitem failures are contained by the
/// processor; transport errors end the cycle early and are returned.
pub async fn drain(processor: &WorkitemProcessor, wiq: &str) -> Result<DrainSummary> {
    let mut summary = DrainSummary::default();

    while let Some(workitem) = processor.queue().pop_workitem(wiq).await? {
        let transition = processor.process(workitem).await?;
        summary.record(transition);
    }

    if summary.processed == 0 {
        info!(wiq, "No workitems in {} workitem queue", wiq);
    } else {
        info!(
            wiq,
            processed = summary.processed,
            succeeded = summary.succeeded,
            retried = summary.retried,
            "No more workitems in {} workitem queue",
            wiq
        );
    }
    Ok(summary)
}
