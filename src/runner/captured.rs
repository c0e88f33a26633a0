// src/runner/captured.rs

//! Single-task execution with the worker's output piped through the parent.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::{RunOptions, TaskProcessRunner, wait_exit};
use crate::errors::Result;
use crate::model::{ExecutionResult, Task, TaskStatus};
use crate::output::pump::{Tee, pump_stream};
use crate::output::{OutputBuffer, OutputPipeline, StreamKind, project_prefix};
use crate::pool::{SpawnRequest, StdioMode};
use crate::protocol::RunTaskRequest;

impl TaskProcessRunner {
    /// Run `task` with piped output.
    ///
    /// Both streams are accumulated in arrival order and written to
    /// `options.output_path` once the worker exits. With `stream_output` the
    /// output is also shown live, otherwise it is handed to the reporter at
    /// the end.
    pub async fn run_captured(&self, task: &Task, options: RunOptions<'_>) -> Result<ExecutionResult> {
        if options.stream_output {
            self.announce_task(task);
        }

        let worker = self.pool.spawn(SpawnRequest {
            command: &self.config.task_worker,
            stdio: StdioMode::Pipe,
            env: options.env,
            label: &task.id,
        })?;
        let pid = worker.pid;
        self.forward_worker_messages(worker.messages, &task.id);

        let request = RunTaskRequest::for_task(task, options.task_graph, self.config.verbose);
        if let Err(err) = worker.control.send(&request) {
            warn!(task = %task.id, pid, error = %err, "failed to send task request to worker");
        }
        drop(worker.control);

        let buffer = OutputBuffer::default();
        let mut pumps = Vec::with_capacity(2);
        if let Some(stdout) = worker.stdout {
            let tee = self.tee_for(task, StreamKind::Stdout, options.stream_output);
            pumps.push(pump_stream(stdout, buffer.clone(), tee, StreamKind::Stdout));
        }
        if let Some(stderr) = worker.stderr {
            let tee = self.tee_for(task, StreamKind::Stderr, options.stream_output);
            pumps.push(pump_stream(stderr, buffer.clone(), tee, StreamKind::Stderr));
        }

        let exit = wait_exit(worker.exit).await;
        settle_pumps(&task.id, pumps, self.config.message_drain).await;

        let code = exit.derived_code();
        let terminal_output = buffer.contents();
        info!(task = %task.id, pid, exit_code = code, "task finished");

        if !options.stream_output {
            self.reporter
                .print_task_terminal_output(task, TaskStatus::from_code(code), &terminal_output);
        }
        if let Err(err) = self.store.write(options.output_path, &terminal_output) {
            warn!(task = %task.id, error = %format!("{err:#}"), "failed to store terminal output");
        }

        Ok(ExecutionResult {
            code,
            terminal_output,
        })
    }

    fn tee_for(&self, task: &Task, stream: StreamKind, stream_output: bool) -> Option<Tee> {
        if !stream_output {
            return None;
        }
        let pipeline = if self.config.prefix_output {
            let label = project_prefix(task.project(), stream == StreamKind::Stdout);
            OutputPipeline::prefixed(&label)
        } else {
            OutputPipeline::plain()
        };
        Some(Tee {
            pipeline,
            sink: self.terminal.get(stream),
        })
    }
}

/// Wait for the pumps to hit end of stream. Pipes held open by a grandchild
/// would block forever, so give up after `grace`.
async fn settle_pumps(label: &str, pumps: Vec<JoinHandle<Result<u64>>>, grace: Duration) {
    for mut pump in pumps {
        match tokio::time::timeout(grace, &mut pump).await {
            Ok(Ok(Ok(_))) => {}
            Ok(Ok(Err(err))) => warn!(task = %label, error = %err, "reading worker output failed"),
            Ok(Err(err)) => warn!(task = %label, error = %err, "output pump panicked"),
            Err(_) => {
                pump.abort();
                warn!(task = %label, "worker output still open after exit; no longer relaying it");
            }
        }
    }
}
