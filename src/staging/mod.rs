// src/staging/mod.rs

//! File staging around task execution.
//!
//! - [`snapshot`] records which regular files exist in the working directory.
//! - [`stager`] writes inbound workitem files, finds the files created since a
//!   snapshot, and removes them once they have been handed to the queue.
//!
//! "Created since the snapshot" is only meaningful while a single attempt
//! owns the working directory, so staging is never run concurrently.

pub mod snapshot;
pub mod stager;

pub use snapshot::DirectorySnapshot;
pub use stager::FileStager;
