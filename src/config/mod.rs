// src/config/mod.rs

//! Runner configuration: TOML file plus environment overrides.

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{DEFAULT_CONFIG_PATH, load_and_validate, load_from_path, load_or_default};
pub use model::{
    BATCH_WORKER_ARG, OutputSection, PREFIX_OUTPUT_ENV, RawRunnerConfig, RunnerConfig,
    TASK_WORKER_ARG, VERBOSE_ENV,
};
