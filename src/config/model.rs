// src/config/model.rs

use std::time::Duration;

use serde::Deserialize;

use crate::pool::WorkerCommand;

pub const VERBOSE_ENV: &str = "TASKFORK_VERBOSE_LOGGING";
pub const PREFIX_OUTPUT_ENV: &str = "TASKFORK_PREFIX_OUTPUT";

pub const TASK_WORKER_ARG: &str = "__task-worker";
pub const BATCH_WORKER_ARG: &str = "__batch-worker";

/// Configuration as read from a TOML file.
///
/// ```toml
/// [worker]
/// program = "/usr/local/bin/build-tool"
/// args = ["__task-worker"]
///
/// [batch_worker]
/// program = "/usr/local/bin/build-tool"
/// args = ["__batch-worker"]
///
/// [output]
/// prefix = false
/// verbose = false
/// message_drain_ms = 100
/// ```
///
/// Every section is optional. Missing workers default to the current
/// executable with a worker subcommand.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawRunnerConfig {
    #[serde(default)]
    pub worker: Option<WorkerCommand>,

    #[serde(default)]
    pub batch_worker: Option<WorkerCommand>,

    #[serde(default)]
    pub output: OutputSection,
}

/// `[output]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct OutputSection {
    /// Prefix streamed lines with a coloured `project:` label.
    #[serde(default)]
    pub prefix: bool,

    /// Forwarded to workers as `isVerbose`.
    #[serde(default)]
    pub verbose: bool,

    /// How long to keep reading already-written control messages after a
    /// worker has exited.
    #[serde(default = "default_message_drain_ms")]
    pub message_drain_ms: u64,
}

impl Default for OutputSection {
    fn default() -> Self {
        Self {
            prefix: false,
            verbose: false,
            message_drain_ms: default_message_drain_ms(),
        }
    }
}

fn default_message_drain_ms() -> u64 {
    100
}

/// Validated runner configuration.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub task_worker: WorkerCommand,
    pub batch_worker: WorkerCommand,
    pub verbose: bool,
    pub prefix_output: bool,
    pub message_drain: Duration,
}

impl RunnerConfig {
    pub fn new(task_worker: WorkerCommand, batch_worker: WorkerCommand) -> Self {
        Self {
            task_worker,
            batch_worker,
            verbose: false,
            prefix_output: false,
            message_drain: Duration::from_millis(default_message_drain_ms()),
        }
    }

    /// Defaults plus environment overrides, without reading any file.
    pub fn from_env() -> crate::errors::Result<Self> {
        let config = RunnerConfig::try_from(RawRunnerConfig::default())?;
        Ok(config.with_env_overrides(|key| std::env::var(key).ok()))
    }

    /// Apply `TASKFORK_VERBOSE_LOGGING` / `TASKFORK_PREFIX_OUTPUT`. A variable
    /// that is set wins over the file; only the literal `true` enables.
    pub fn with_env_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(value) = lookup(VERBOSE_ENV) {
            self.verbose = value == "true";
        }
        if let Some(value) = lookup(PREFIX_OUTPUT_ENV) {
            self.prefix_output = value == "true";
        }
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_prefix_output(mut self, prefix_output: bool) -> Self {
        self.prefix_output = prefix_output;
        self
    }

    pub fn with_message_drain(mut self, message_drain: Duration) -> Self {
        self.message_drain = message_drain;
        self
    }
}
