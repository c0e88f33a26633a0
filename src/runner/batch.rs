// src/runner/batch.rs

//! Batch execution: one worker runs every task of a batch.
//!
//! The worker receives a single `runTasks` message and answers with a single
//! `completeBatchExecution`. Everything else it sends is passed upstream.
//! If it dies first, every root task of the batch is reported as failed.

use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::{TaskProcessRunner, display_command, forward_upstream};
use crate::errors::{Result, TaskforkError};
use crate::model::{Batch, BatchResults, Environment, TaskGraph, TaskResult};
use crate::pool::{ProcessExit, SpawnRequest, StdioMode};
use crate::protocol::{BatchMessage, ControlSender, RunTasks};

enum BatchOutcome {
    Completed(BatchResults),
    Exited(ProcessExit),
}

impl TaskProcessRunner {
    /// Run `batch` in a fresh batch worker and wait for its results.
    pub async fn run_batch(
        &self,
        batch: &Batch,
        full_graph: &TaskGraph,
        env: &Environment,
    ) -> Result<BatchResults> {
        let executor = batch.executor_name.as_str();
        self.announce_batch(batch);

        let worker = self.pool.spawn(SpawnRequest {
            command: &self.config.batch_worker,
            stdio: StdioMode::Inherit,
            env,
            label: executor,
        })?;
        let pid = worker.pid;
        let mut messages = worker.messages;
        let mut exit = worker.exit;

        let request = BatchMessage::RunTasks(RunTasks {
            executor_name: executor.to_string(),
            batch_task_graph: batch.task_graph.clone(),
            full_task_graph: full_graph.clone(),
        });
        if let Err(err) = worker.control.send(&request) {
            warn!(executor, pid, error = %err, "failed to send batch to worker");
        }
        drop(worker.control);

        let outcome = loop {
            tokio::select! {
                biased;
                Some(message) = messages.recv() => {
                    if let Some(results) = self.handle_message(executor, message) {
                        break BatchOutcome::Completed(results);
                    }
                }
                status = &mut exit => {
                    break BatchOutcome::Exited(status.unwrap_or_default());
                }
            }
        };

        let results = match outcome {
            BatchOutcome::Completed(results) => {
                tokio::spawn(follow_after_completion(
                    messages,
                    self.upstream.clone(),
                    executor.to_string(),
                ));
                results
            }
            BatchOutcome::Exited(status) => match self.drain_late_messages(executor, &mut messages).await {
                Some(results) => results,
                None => return Err(batch_failure(executor, &batch.task_graph, status)),
            },
        };

        info!(executor, pid, tasks = results.len(), "batch completed");
        Ok(results)
    }

    fn announce_batch(&self, batch: &Batch) {
        let tasks: Vec<_> = batch.task_graph.tasks.values().collect();
        match tasks.as_slice() {
            [task] => self.reporter.log_command(&display_command(task)),
            _ => self.reporter.log_single_line(&format!(
                "Running {} tasks with {}",
                tasks.len(),
                batch.executor_name
            )),
        }
    }

    /// Returns the results if `message` completes the batch.
    fn handle_message(&self, executor: &str, message: Value) -> Option<BatchResults> {
        match BatchMessage::try_from(message) {
            Ok(BatchMessage::CompleteBatchExecution(done)) => Some(done.results),
            Ok(BatchMessage::RunTasks(_)) => {
                debug!(executor, "ignoring runTasks sent by batch worker");
                None
            }
            Ok(BatchMessage::Passthrough(value)) => {
                forward_upstream(self.upstream.as_ref(), executor, value);
                None
            }
            Err(err) => {
                warn!(executor, error = %err, "ignoring malformed batch message");
                None
            }
        }
    }

    /// After the worker exited, pick up messages it wrote before exiting.
    async fn drain_late_messages(
        &self,
        executor: &str,
        messages: &mut mpsc::UnboundedReceiver<Value>,
    ) -> Option<BatchResults> {
        let drain = async {
            while let Some(message) = messages.recv().await {
                if let Some(results) = self.handle_message(executor, message) {
                    return Some(results);
                }
            }
            None
        };
        match tokio::time::timeout(self.config.message_drain, drain).await {
            Ok(results) => results,
            Err(_) => {
                debug!(executor, "control channel still open after worker exit");
                None
            }
        }
    }
}

fn batch_failure(executor: &str, batch_graph: &TaskGraph, status: ProcessExit) -> TaskforkError {
    let code = status.derived_code();
    if code == 0 {
        error!(executor, "batch worker exited without reporting results");
        return TaskforkError::BatchIncomplete {
            executor: executor.to_string(),
        };
    }

    let results: BatchResults = batch_graph
        .roots
        .iter()
        .map(|id| (id.clone(), TaskResult::failed_without_output()))
        .collect();
    error!(
        executor,
        exit_code = code,
        signal = status.signal_name().unwrap_or("none"),
        failed_roots = results.len(),
        "batch worker exited unexpectedly"
    );
    TaskforkError::BatchExited {
        executor: executor.to_string(),
        code,
        results,
    }
}

/// Keep relaying passthrough messages once the batch has completed.
async fn follow_after_completion(
    mut messages: mpsc::UnboundedReceiver<Value>,
    upstream: Option<ControlSender>,
    executor: String,
) {
    while let Some(message) = messages.recv().await {
        match BatchMessage::try_from(message) {
            Ok(BatchMessage::Passthrough(value)) => {
                forward_upstream(upstream.as_ref(), &executor, value)
            }
            Ok(other) => warn!(
                executor = %executor,
                message_type = other.tag().unwrap_or("unknown"),
                "batch worker sent a typed message after completion; ignoring"
            ),
            Err(err) => warn!(executor = %executor, error = %err, "ignoring malformed batch message"),
        }
    }
}
