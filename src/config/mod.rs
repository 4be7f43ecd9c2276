// src/config/mod.rs

//! Configuration loading and validation for wiqrunner.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk and overlay the recognized environment
//!   variables (`loader.rs`).
//! - Validate basic invariants like a non-empty workitem queue (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{apply_env_overrides, load_and_validate, load_from_path};
pub use model::{ConfigFile, DriveMode, QueueSection, RawConfigFile, TaskSection, TimingSection};
pub use validate::validate_config;
