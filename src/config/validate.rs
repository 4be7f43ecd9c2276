// src/config/validate.rs

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{Result, WorkerError};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = WorkerError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw))
    }
}

/// Check the invariants every runnable configuration must satisfy.
pub fn validate_config(cfg: &RawConfigFile) -> Result<()> {
    validate_queue(cfg)?;
    validate_task(cfg)?;
    validate_timing(cfg)?;
    Ok(())
}

fn validate_queue(cfg: &RawConfigFile) -> Result<()> {
    if cfg.queue.wiq.trim().is_empty() {
        return Err(WorkerError::ConfigError(
            "Workitem queue name (wiq) is required".to_string(),
        ));
    }
    Ok(())
}

fn validate_task(cfg: &RawConfigFile) -> Result<()> {
    if cfg.task.cmd.trim().is_empty() {
        return Err(WorkerError::ConfigError(
            "[task].cmd must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_timing(cfg: &RawConfigFile) -> Result<()> {
    if cfg.timing.poll_interval_secs == 0 {
        return Err(WorkerError::ConfigError(
            "[timing].poll_interval_secs must be >= 1 (got 0)".to_string(),
        ));
    }
    if cfg.timing.idle_tick_secs == 0 {
        return Err(WorkerError::ConfigError(
            "[timing].idle_tick_secs must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}
