// src/queue/mod.rs

//! Queue service collaborator.
//!
//! The queue service is authoritative for workitem state. This crate only
//! talks to it through [`QueueClient`]:
//!
//! - [`QueueClient`] is the abstract client (sign in, pop, update, download,
//!   subscribe to notifications).
//! - [`memory`] provides [`MemoryQueueClient`], an in-process service used by
//!   tests and by local `--seed` runs.

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;

use tokio::sync::mpsc;

use crate::errors::Result;
use crate::workitem::Workitem;

pub mod memory;

pub use memory::MemoryQueueClient;

/// Boxed future returned by the collaborator traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// "New work may be available" signal delivered for a registered queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueNotification {
    pub queue: String,
    /// Raw message body, if the service sent one. Not interpreted.
    pub payload: Option<String>,
}

/// Handle returned by [`QueueClient::register_queue`].
///
/// Dropping the receiver ends the subscription.
#[derive(Debug)]
pub struct Subscription {
    /// Name the service actually consumes from (it may differ from the
    /// requested one, e.g. for temporary queues).
    pub queue_name: String,
    pub notifications: mpsc::Receiver<QueueNotification>,
}

/// Trait abstracting the remote queue service.
///
/// All calls are transport calls: their errors are not workitem failures and
/// propagate to the caller as `WorkerError::Transport`.
pub trait QueueClient: Send + Sync {
    fn sign_in(&self) -> BoxFuture<'_, Result<()>>;

    /// Pop the next workitem of `wiq`, or `None` if the queue is empty.
    ///
    /// A popped workitem is owned by the caller until `update_workitem`.
    fn pop_workitem<'a>(&'a self, wiq: &'a str) -> BoxFuture<'a, Result<Option<Workitem>>>;

    /// Persist `workitem` and upload `files` (paths to local files) as
    /// attachments. `done` hands ownership back to the service.
    fn update_workitem<'a>(
        &'a self,
        workitem: &'a Workitem,
        files: &'a [PathBuf],
        done: bool,
    ) -> BoxFuture<'a, Result<()>>;

    /// Fetch the content of a stored file by id.
    fn download_file<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<Vec<u8>>>;

    /// Subscribe to notifications on `queue`.
    fn register_queue<'a>(&'a self, queue: &'a str) -> BoxFuture<'a, Result<Subscription>>;
}
