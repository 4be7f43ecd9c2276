// src/workitem.rs

//! Workitem data model.
//!
//! Field names on the wire follow the queue service (`_id`, `errortype`, ...),
//! while the Rust side uses typed fields and enums.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle state of a workitem.
///
/// The vocabulary belongs to the queue service; this crate only ever writes
/// `Successful` or `Retry`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkitemState {
    #[default]
    New,
    Processing,
    Successful,
    Retry,
    Failed,
}

impl fmt::Display for WorkitemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WorkitemState::New => "new",
            WorkitemState::Processing => "processing",
            WorkitemState::Successful => "successful",
            WorkitemState::Retry => "retry",
            WorkitemState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Error classification read by the queue service's retry policy.
///
/// - `Application`: always eligible for redelivery (up to the queue's ceiling).
/// - `Business`: a business-rule rejection, never redelivered.
///
/// The task adapter only ever produces `Application`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorType {
    Application,
    Business,
}

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorType::Application => f.write_str("application"),
            ErrorType::Business => f.write_str("business"),
        }
    }
}

/// A file attached to a workitem.
///
/// If `file` is `None` (or empty) the content lives in the queue service and
/// must be downloaded by `id`. If `compressed` is set, `file` holds zlib data.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FileRef {
    #[serde(rename = "_id", default)]
    pub id: String,
    pub filename: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<Vec<u8>>,
    #[serde(default)]
    pub compressed: bool,
}

impl FileRef {
    /// Inline content, treating an empty buffer the same as no content.
    pub fn inline_content(&self) -> Option<&[u8]> {
        self.file.as_deref().filter(|bytes| !bytes.is_empty())
    }
}

/// Unit of deferred work popped from a workitem queue.
///
/// Owned exclusively by the current processing attempt until it is handed
/// back through `QueueClient::update_workitem`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Workitem {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub wiq: String,
    #[serde(default)]
    pub state: WorkitemState,
    #[serde(default)]
    pub retries: u32,
    /// Serialized JSON document; see [`crate::payload`].
    #[serde(default)]
    pub payload: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errortype: Option<ErrorType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errormessage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errorsource: Option<String>,
    #[serde(default)]
    pub files: Vec<FileRef>,
}

impl Workitem {
    /// True when none of the three error fields is set.
    pub fn has_no_error(&self) -> bool {
        self.errortype.is_none() && self.errormessage.is_none() && self.errorsource.is_none()
    }

    pub(crate) fn clear_error(&mut self) {
        self.errortype = None;
        self.errormessage = None;
        self.errorsource = None;
    }
}
