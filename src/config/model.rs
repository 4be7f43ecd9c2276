// src/config/model.rs

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Workitem queue used when neither the config file nor `wiq` names one.
pub const DEFAULT_WIQ: &str = "robotframeworktest";

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [queue]
/// wiq = "robotframeworktest"
/// queue = ""
///
/// [task]
/// cmd = "robot example.robot"
/// workdir = "."
///
/// [timing]
/// poll_interval_secs = 30
/// idle_tick_secs = 1
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub queue: QueueSection,

    #[serde(default)]
    pub task: TaskSection,

    #[serde(default)]
    pub timing: TimingSection,
}

/// `[queue]` section.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QueueSection {
    /// Workitem queue to drain (`wiq` in the environment).
    #[serde(default = "default_wiq")]
    pub wiq: String,

    /// Notification queue to subscribe to (`queue` in the environment).
    ///
    /// Empty, or equal to `wiq`, means self-polling.
    #[serde(default)]
    pub queue: String,

    /// Redelivery ceiling applied by the in-process queue service to
    /// `application` failures.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_wiq() -> String {
    DEFAULT_WIQ.to_string()
}

fn default_max_retries() -> u32 {
    3
}

impl Default for QueueSection {
    fn default() -> Self {
        Self {
            wiq: default_wiq(),
            queue: String::new(),
            max_retries: default_max_retries(),
        }
    }
}

/// `[task]` section: the external program run once per workitem.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TaskSection {
    /// Shell command line of the external task.
    #[serde(default = "default_cmd")]
    pub cmd: String,

    /// Working directory shared by the task and the file stager.
    #[serde(default = "default_workdir")]
    pub workdir: PathBuf,

    /// Value written to the workitem's `name` once the task has run.
    #[serde(default = "default_completion_label")]
    pub completion_label: String,
}

fn default_cmd() -> String {
    "robot example.robot".to_string()
}

fn default_workdir() -> PathBuf {
    PathBuf::from(".")
}

fn default_completion_label() -> String {
    "Robot example completed".to_string()
}

impl Default for TaskSection {
    fn default() -> Self {
        Self {
            cmd: default_cmd(),
            workdir: default_workdir(),
            completion_label: default_completion_label(),
        }
    }
}

/// `[timing]` section.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TimingSection {
    /// Sleep between two drains in self-polling mode.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Liveness tick of the main loop in event-driven mode.
    #[serde(default = "default_idle_tick_secs")]
    pub idle_tick_secs: u64,
}

fn default_poll_interval_secs() -> u64 {
    30
}

fn default_idle_tick_secs() -> u64 {
    1
}

impl Default for TimingSection {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            idle_tick_secs: default_idle_tick_secs(),
        }
    }
}

/// How the runtime decides when to drain. Chosen once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriveMode {
    /// Drain, sleep `interval`, repeat.
    SelfPolling { interval: Duration },
    /// Drain once per notification received on `queue`.
    EventDriven { queue: String, idle_tick: Duration },
}

/// Validated configuration.
///
/// Only constructed through `TryFrom<RawConfigFile>`, so every instance has
/// a non-empty workitem queue and task command.
#[derive(Debug, Clone, Serialize)]
pub struct ConfigFile {
    pub queue: QueueSection,
    pub task: TaskSection,
    pub timing: TimingSection,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(raw: RawConfigFile) -> Self {
        Self {
            queue: raw.queue,
            task: raw.task,
            timing: raw.timing,
        }
    }

    pub fn wiq(&self) -> &str {
        &self.queue.wiq
    }

    /// Self-polling unless a notification queue distinct from the workitem
    /// queue is configured.
    pub fn drive_mode(&self) -> DriveMode {
        if self.queue.queue.is_empty() || self.queue.queue == self.queue.wiq {
            DriveMode::SelfPolling {
                interval: Duration::from_secs(self.timing.poll_interval_secs),
            }
        } else {
            DriveMode::EventDriven {
                queue: self.queue.queue.clone(),
                idle_tick: Duration::from_secs(self.timing.idle_tick_secs),
            }
        }
    }
}
