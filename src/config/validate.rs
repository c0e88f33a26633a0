// src/config/validate.rs

use std::time::Duration;

use crate::config::model::{BATCH_WORKER_ARG, RawRunnerConfig, RunnerConfig, TASK_WORKER_ARG};
use crate::errors::{Result, TaskforkError};
use crate::pool::WorkerCommand;

impl TryFrom<RawRunnerConfig> for RunnerConfig {
    type Error = crate::errors::TaskforkError;

    fn try_from(raw: RawRunnerConfig) -> std::result::Result<Self, Self::Error> {
        let task_worker = match raw.worker {
            Some(cmd) => validate_worker("worker", cmd)?,
            None => current_exe_worker(TASK_WORKER_ARG)?,
        };
        let batch_worker = match raw.batch_worker {
            Some(cmd) => validate_worker("batch_worker", cmd)?,
            None => current_exe_worker(BATCH_WORKER_ARG)?,
        };

        Ok(RunnerConfig::new(task_worker, batch_worker)
            .with_verbose(raw.output.verbose)
            .with_prefix_output(raw.output.prefix)
            .with_message_drain(Duration::from_millis(raw.output.message_drain_ms)))
    }
}

fn validate_worker(section: &str, cmd: WorkerCommand) -> Result<WorkerCommand> {
    if cmd.program.trim().is_empty() {
        return Err(TaskforkError::ConfigError(format!(
            "[{section}].program must not be empty"
        )));
    }
    Ok(cmd)
}

fn current_exe_worker(arg: &str) -> Result<WorkerCommand> {
    let exe = std::env::current_exe().map_err(|err| {
        TaskforkError::ConfigError(format!("cannot resolve current executable: {err}"))
    })?;
    Ok(WorkerCommand::new(exe.to_string_lossy()).arg(arg))
}
