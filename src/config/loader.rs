// src/config/loader.rs

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::config::model::{RawRunnerConfig, RunnerConfig};
use crate::errors::Result;

/// Read and deserialize a TOML file without validating it.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawRunnerConfig> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let config: RawRunnerConfig = toml::from_str(&contents)?;

    Ok(config)
}

/// Read, validate and apply environment overrides.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<RunnerConfig> {
    let raw_config = load_from_path(&path)?;
    let config = RunnerConfig::try_from(raw_config)?;
    Ok(config.with_env_overrides(|key| std::env::var(key).ok()))
}

/// Like [`load_and_validate`], but a missing file means defaults.
pub fn load_or_default(path: impl AsRef<Path>) -> Result<RunnerConfig> {
    let path = path.as_ref();
    if path.exists() {
        load_and_validate(path)
    } else {
        debug!(path = %path.display(), "no config file; using defaults");
        RunnerConfig::from_env()
    }
}

/// Config file used when `--config` is not given.
pub const DEFAULT_CONFIG_PATH: &str = "Taskfork.toml";
