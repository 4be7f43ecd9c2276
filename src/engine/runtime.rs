// src/engine/runtime.rs

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::DriveMode;
use crate::errors::Result;
use crate::queue::QueueNotification;

use super::drain::{drain, DrainSummary};
use super::processor::WorkitemProcessor;
use super::{DrainEvent, RuntimeEvent, RuntimeOptions};

/// Decides when to drain the workitem queue.
///
/// - Self-polling: drain, sleep, repeat.
/// - Notification-driven: a separate task drains once per notification while
///   this loop only ticks and waits for shutdown. The two talk through
///   channels only.
///
/// At most one drain runs at any time in either mode.
pub struct Runtime {
    processor: Arc<WorkitemProcessor>,
    wiq: String,
    mode: DriveMode,
    options: RuntimeOptions,
    event_rx: mpsc::Receiver<RuntimeEvent>,
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("wiq", &self.wiq)
            .field("mode", &self.mode)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Runtime {
    pub fn new(
        processor: Arc<WorkitemProcessor>,
        wiq: impl Into<String>,
        mode: DriveMode,
        options: RuntimeOptions,
        event_rx: mpsc::Receiver<RuntimeEvent>,
    ) -> Self {
        Self {
            processor,
            wiq: wiq.into(),
            mode,
            options,
            event_rx,
        }
    }

    /// Sign in, then drain according to the mode until shutdown.
    ///
    /// Returns the totals over every drain performed.
    pub async fn run(mut self) -> Result<DrainSummary> {
        self.processor.queue().sign_in().await?;
        info!(wiq = %self.wiq, mode = ?self.mode, "wiqrunner runtime started");

        if self.options.once {
            return drain(&self.processor, &self.wiq).await;
        }

        let totals = match self.mode.clone() {
            DriveMode::SelfPolling { interval } => self.run_polling(interval).await,
            DriveMode::EventDriven { queue, idle_tick } => {
                self.run_event_driven(&queue, idle_tick).await?
            }
        };

        info!(
            processed = totals.processed,
            succeeded = totals.succeeded,
            retried = totals.retried,
            "runtime exiting"
        );
        Ok(totals)
    }

    async fn run_polling(&mut self, interval: Duration) -> DrainSummary {
        let mut totals = DrainSummary::default();

        loop {
            match drain(&self.processor, &self.wiq).await {
                Ok(summary) => totals.merge(summary),
                // Retried on the next tick.
                Err(e) => error!(wiq = %self.wiq, error = %e, "drain cycle failed"),
            }

            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                event = self.event_rx.recv() => {
                    if should_stop(event) {
                        break;
                    }
                }
            }
        }

        totals
    }

    async fn run_event_driven(&mut self, queue: &str, idle_tick: Duration) -> Result<DrainSummary> {
        let subscription = self.processor.queue().register_queue(queue).await?;
        info!(queue = %subscription.queue_name, "Consuming queue {}", subscription.queue_name);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (report_tx, mut report_rx) = mpsc::channel::<DrainEvent>(16);
        let worker = spawn_drain_worker(
            Arc::clone(&self.processor),
            self.wiq.clone(),
            subscription.notifications,
            report_tx,
            shutdown_rx,
        );

        let mut totals = DrainSummary::default();
        let mut ticker = tokio::time::interval(idle_tick);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if worker.is_finished() {
                        warn!(queue, "notification subscription ended; stopping");
                        break;
                    }
                }
                Some(report) = report_rx.recv() => match report {
                    DrainEvent::Completed(summary) => totals.merge(summary),
                    DrainEvent::Failed(e) => debug!(error = %e, "drain failure reported"),
                },
                event = self.event_rx.recv() => {
                    if should_stop(event) {
                        break;
                    }
                }
            }
        }

        // Let an in-flight drain finish before returning.
        let _ = shutdown_tx.send(true);
        let _ = worker.await;
        while let Ok(report) = report_rx.try_recv() {
            if let DrainEvent::Completed(summary) = report {
                totals.merge(summary);
            }
        }
        Ok(totals)
    }
}

fn should_stop(event: Option<RuntimeEvent>) -> bool {
    match event {
        Some(RuntimeEvent::ShutdownRequested) => {
            info!("shutdown requested");
            true
        }
        None => {
            info!("runtime event channel closed; exiting");
            true
        }
    }
}

/// Spawn the task that drains `wiq` once per notification.
///
/// Notifications already waiting when a drain starts are folded into that
/// drain; ones arriving during it trigger another. The worker stops when the
/// notification channel closes or `shutdown` flips to `true`, never in the
/// middle of a drain.
pub fn spawn_drain_worker(
    processor: Arc<WorkitemProcessor>,
    wiq: String,
    mut notifications: mpsc::Receiver<QueueNotification>,
    report_tx: mpsc::Sender<DrainEvent>,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        debug!(wiq = %wiq, "drain worker started");

        loop {
            if *shutdown.borrow() {
                break;
            }

            let note = tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
                note = notifications.recv() => note,
            };

            let Some(note) = note else {
                info!("notification channel closed");
                break;
            };
            debug!(queue = %note.queue, "notification received");

            let mut coalesced = 0usize;
            while notifications.try_recv().is_ok() {
                coalesced += 1;
            }
            if coalesced > 0 {
                debug!(coalesced, "folded pending notifications into this drain");
            }

            let report = match drain(&processor, &wiq).await {
                Ok(summary) => DrainEvent::Completed(summary),
                Err(e) => {
                    error!(wiq = %wiq, error = %e, "drain cycle failed");
                    DrainEvent::Failed(e.to_string())
                }
            };
            let _ = report_tx.send(report).await;
        }

        debug!("drain worker finished");
    })
}
