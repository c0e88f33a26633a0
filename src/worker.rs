// src/worker.rs

//! Worker side of the protocol for the built-in fallback workers.
//!
//! When no worker program is configured, `taskfork` forks itself with a
//! hidden worker subcommand. These workers have no executor to run, so they
//! read their request, report every task as failed and exit.

use tracing::{debug, warn};

use crate::errors::{Result, TaskforkError};
use crate::model::{BatchResults, TaskResult};
use crate::protocol::{BatchMessage, CompleteBatchExecution, ControlChannel, RunTaskRequest};

/// Exit code of the fallback task worker.
pub const NO_EXECUTOR_EXIT_CODE: i32 = 1;

fn attach() -> Result<ControlChannel> {
    ControlChannel::from_env()?.ok_or_else(|| {
        TaskforkError::ControlChannel("worker started without a control channel".to_string())
    })
}

/// Read the single-task request and return the worker's exit code.
pub async fn run_task_worker() -> Result<i32> {
    let mut channel = attach()?;
    let Some(message) = channel.messages.recv().await else {
        return Err(TaskforkError::ControlChannel(
            "parent closed the control channel before sending a task".to_string(),
        ));
    };
    let request: RunTaskRequest = serde_json::from_value(message)?;
    debug!(target_description = %request.target_description, "task request received");

    eprintln!(
        "No executor is configured to run {}.",
        request.target_description
    );
    Ok(NO_EXECUTOR_EXIT_CODE)
}

/// Read the batch, answer with a failed result for every task, and wait for
/// the reply to be flushed.
pub async fn run_batch_worker() -> Result<i32> {
    let mut channel = attach()?;
    let run = loop {
        let Some(message) = channel.messages.recv().await else {
            return Err(TaskforkError::ControlChannel(
                "parent closed the control channel before sending a batch".to_string(),
            ));
        };
        match BatchMessage::try_from(message)? {
            BatchMessage::RunTasks(run) => break run,
            other => warn!(message_type = other.tag().unwrap_or("passthrough"), "ignoring message before runTasks"),
        }
    };

    let results: BatchResults = run
        .batch_task_graph
        .tasks
        .keys()
        .map(|id| {
            let output = format!("No executor is configured for \"{}\".\n", run.executor_name);
            (
                id.clone(),
                TaskResult {
                    success: false,
                    terminal_output: output,
                },
            )
        })
        .collect();

    channel
        .sender
        .send(&BatchMessage::CompleteBatchExecution(CompleteBatchExecution { results }))?;
    channel.close().await;
    Ok(0)
}
