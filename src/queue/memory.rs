// src/queue/memory.rs

//! In-process queue service.
//!
//! Behaves like the remote service as far as the worker can observe:
//! FIFO workitem queues, `processing` on pop, attachments on update, a file
//! store for downloads, and per-queue notifications. It also owns the retry
//! policy that reads `errortype`, applied on demand by [`requeue_retries`].
//!
//! [`requeue_retries`]: MemoryQueueClient::requeue_retries

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::errors::{Result, WorkerError};
use crate::fs::FileSystem;
use crate::queue::{BoxFuture, QueueClient, QueueNotification, Subscription};
use crate::workitem::{ErrorType, FileRef, Workitem, WorkitemState};

const NOTIFICATION_BUFFER: usize = 16;

/// One `update_workitem` call as received by the service.
#[derive(Debug, Clone)]
pub struct UpdateRecord {
    pub workitem: Workitem,
    /// File names (not paths) of the uploaded attachments.
    pub files: Vec<String>,
    pub done: bool,
}

#[derive(Debug, Default)]
struct ServiceState {
    signed_in: bool,
    next_id: u64,
    queues: HashMap<String, VecDeque<Workitem>>,
    records: BTreeMap<String, Workitem>,
    files: HashMap<String, Vec<u8>>,
    subscribers: HashMap<String, Vec<mpsc::Sender<QueueNotification>>>,
    updates: Vec<UpdateRecord>,
    pop_calls: usize,
    failing_pops: usize,
    failing_updates: usize,
}

impl ServiceState {
    fn allocate_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}-{}", self.next_id)
    }
}

#[derive(Debug, Clone)]
pub struct MemoryQueueClient {
    state: Arc<Mutex<ServiceState>>,
    fs: Arc<dyn FileSystem>,
    max_retries: u32,
}

impl MemoryQueueClient {
    /// `fs` is used to read the local files passed to `update_workitem`.
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self {
            state: Arc::new(Mutex::new(ServiceState::default())),
            fs,
            max_retries: 3,
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Enqueue a workitem on `wiq`, assigning an id if it has none.
    ///
    /// Returns the workitem id.
    pub fn push_workitem(&self, wiq: &str, mut workitem: Workitem) -> String {
        let mut state = self.state.lock().unwrap();
        if workitem.id.is_empty() {
            workitem.id = state.allocate_id("wi");
        }
        workitem.wiq = wiq.to_string();
        workitem.state = WorkitemState::New;
        let id = workitem.id.clone();
        state.records.insert(id.clone(), workitem.clone());
        state
            .queues
            .entry(wiq.to_string())
            .or_default()
            .push_back(workitem);
        id
    }

    /// Store a file that workitems can reference by id without inline content.
    pub fn store_file(&self, id: &str, content: impl Into<Vec<u8>>) {
        let mut state = self.state.lock().unwrap();
        state.files.insert(id.to_string(), content.into());
    }

    /// Send a notification to every subscriber of `queue`.
    ///
    /// Returns how many subscribers received it. A full subscriber buffer
    /// drops the notification, since a pending one already triggers a drain.
    pub fn notify(&self, queue: &str) -> usize {
        let mut state = self.state.lock().unwrap();
        let Some(senders) = state.subscribers.get_mut(queue) else {
            return 0;
        };
        senders.retain(|tx| !tx.is_closed());

        let mut delivered = 0;
        for tx in senders.iter() {
            let note = QueueNotification {
                queue: queue.to_string(),
                payload: None,
            };
            if tx.try_send(note).is_ok() {
                delivered += 1;
            }
        }
        delivered
    }

    /// Apply the redelivery policy to every workitem currently in `retry`.
    ///
    /// - `business` failures are never redelivered: state becomes `failed`.
    /// - `application` failures are redelivered with `retries + 1` until
    ///   `retries` reaches the ceiling, then become `failed`.
    ///
    /// Returns the number of redelivered workitems.
    pub fn requeue_retries(&self) -> usize {
        let mut state = self.state.lock().unwrap();
        let retrying: Vec<Workitem> = state
            .records
            .values()
            .filter(|w| w.state == WorkitemState::Retry)
            .cloned()
            .collect();

        let mut requeued = 0;
        for mut workitem in retrying {
            let redeliver = workitem.errortype != Some(ErrorType::Business)
                && workitem.retries < self.max_retries;

            if redeliver {
                workitem.retries += 1;
                workitem.state = WorkitemState::New;
                state
                    .queues
                    .entry(workitem.wiq.clone())
                    .or_default()
                    .push_back(workitem.clone());
                requeued += 1;
            } else {
                workitem.state = WorkitemState::Failed;
            }
            debug!(workitem = %workitem.id, state = %workitem.state, retries = workitem.retries, "applied retry policy");
            state.records.insert(workitem.id.clone(), workitem);
        }
        requeued
    }

    /// Make the next `n` pop calls fail with a transport error.
    pub fn fail_next_pops(&self, n: usize) {
        self.state.lock().unwrap().failing_pops = n;
    }

    /// Make the next `n` update calls fail with a transport error.
    pub fn fail_next_updates(&self, n: usize) {
        self.state.lock().unwrap().failing_updates = n;
    }

    /// Latest stored version of a workitem.
    pub fn record(&self, id: &str) -> Option<Workitem> {
        self.state.lock().unwrap().records.get(id).cloned()
    }

    /// Latest stored version of every workitem, ordered by id.
    pub fn records(&self) -> Vec<Workitem> {
        self.state.lock().unwrap().records.values().cloned().collect()
    }

    pub fn updates(&self) -> Vec<UpdateRecord> {
        self.state.lock().unwrap().updates.clone()
    }

    pub fn pop_calls(&self) -> usize {
        self.state.lock().unwrap().pop_calls
    }

    pub fn update_calls(&self) -> usize {
        self.state.lock().unwrap().updates.len()
    }

    /// Workitems waiting on `wiq`.
    pub fn pending(&self, wiq: &str) -> usize {
        let state = self.state.lock().unwrap();
        state.queues.get(wiq).map_or(0, VecDeque::len)
    }

    fn ensure_signed_in(state: &ServiceState) -> Result<()> {
        if state.signed_in {
            Ok(())
        } else {
            Err(WorkerError::Transport("not signed in".to_string()))
        }
    }

    fn upload(&self, files: &[PathBuf]) -> Result<Vec<(String, Vec<u8>)>> {
        files
            .iter()
            .map(|path| {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .ok_or_else(|| {
                        WorkerError::Transport(format!("cannot upload {:?}: no file name", path))
                    })?;
                let bytes = self
                    .fs
                    .read(path)
                    .map_err(|e| WorkerError::Transport(format!("uploading {name}: {e:#}")))?;
                Ok((name, bytes))
            })
            .collect()
    }
}

impl QueueClient for MemoryQueueClient {
    fn sign_in(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            self.state.lock().unwrap().signed_in = true;
            debug!("signed in to in-process queue service");
            Ok(())
        })
    }

    fn pop_workitem<'a>(&'a self, wiq: &'a str) -> BoxFuture<'a, Result<Option<Workitem>>> {
        Box::pin(async move {
            let mut state = self.state.lock().unwrap();
            Self::ensure_signed_in(&state)?;
            state.pop_calls += 1;
            if state.failing_pops > 0 {
                state.failing_pops -= 1;
                return Err(WorkerError::Transport(format!("pop from {wiq} failed")));
            }

            let popped = state.queues.get_mut(wiq).and_then(VecDeque::pop_front);
            Ok(popped.map(|mut workitem| {
                workitem.state = WorkitemState::Processing;
                state.records.insert(workitem.id.clone(), workitem.clone());
                workitem
            }))
        })
    }

    fn update_workitem<'a>(
        &'a self,
        workitem: &'a Workitem,
        files: &'a [PathBuf],
        done: bool,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            {
                let mut state = self.state.lock().unwrap();
                Self::ensure_signed_in(&state)?;
                if state.failing_updates > 0 {
                    state.failing_updates -= 1;
                    return Err(WorkerError::Transport(format!(
                        "update of workitem {} failed",
                        workitem.id
                    )));
                }
            }

            let uploaded = self.upload(files)?;

            let mut state = self.state.lock().unwrap();
            let mut stored = workitem.clone();
            let mut names = Vec::with_capacity(uploaded.len());
            for (name, bytes) in uploaded {
                let id = state.allocate_id("file");
                state.files.insert(id.clone(), bytes.clone());
                // A re-uploaded name replaces the earlier attachment.
                stored.files.retain(|f| f.filename != name);
                stored.files.push(FileRef {
                    id,
                    filename: name.clone(),
                    file: Some(bytes),
                    compressed: false,
                });
                names.push(name);
            }

            info!(workitem = %stored.id, state = %stored.state, files = names.len(), "workitem updated");
            state.records.insert(stored.id.clone(), stored.clone());
            state.updates.push(UpdateRecord {
                workitem: stored,
                files: names,
                done,
            });
            Ok(())
        })
    }

    fn download_file<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<Vec<u8>>> {
        Box::pin(async move {
            let state = self.state.lock().unwrap();
            Self::ensure_signed_in(&state)?;
            state
                .files
                .get(id)
                .cloned()
                .ok_or_else(|| WorkerError::Transport(format!("file {id} not found")))
        })
    }

    fn register_queue<'a>(&'a self, queue: &'a str) -> BoxFuture<'a, Result<Subscription>> {
        Box::pin(async move {
            let mut state = self.state.lock().unwrap();
            Self::ensure_signed_in(&state)?;
            let (tx, rx) = mpsc::channel(NOTIFICATION_BUFFER);
            state
                .subscribers
                .entry(queue.to_string())
                .or_default()
                .push(tx);
            Ok(Subscription {
                queue_name: queue.to_string(),
                notifications: rx,
            })
        })
    }
}
