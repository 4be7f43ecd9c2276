// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::Result;

/// Load a configuration file from a given path and return the raw `RawConfigFile`.
///
/// This only performs TOML deserialization; it does **not** perform semantic
/// validation. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let config: RawConfigFile = toml::from_str(&contents)?;

    Ok(config)
}

/// Overlay the recognized environment variables (`queue`, `wiq`) on top of
/// a raw config.
///
/// `lookup` abstracts `std::env::var` so callers (and tests) control the
/// source. Empty values count as unset.
pub fn apply_env_overrides<F>(mut raw: RawConfigFile, lookup: F) -> RawConfigFile
where
    F: Fn(&str) -> Option<String>,
{
    let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(wiq) = non_empty("wiq") {
        raw.queue.wiq = wiq;
    }
    if let Some(queue) = non_empty("queue") {
        raw.queue.queue = queue;
    }
    raw
}

/// Load configuration and run validation.
///
/// This is the recommended entry point for the rest of the application:
///
/// - Reads TOML if `path` exists. A missing file at the default location
///   falls back to built-in defaults; a missing explicit file is an error.
/// - Applies environment overrides from the process environment.
/// - Validates the result.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let path = path.as_ref();
    let raw = if !path.exists() && path == default_config_path() {
        RawConfigFile::default()
    } else {
        load_from_path(path)?
    };

    let raw = apply_env_overrides(raw, |key| std::env::var(key).ok());
    ConfigFile::try_from(raw)
}

/// Default config location: `wiqrunner.toml` in the current directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("wiqrunner.toml")
}
