// src/runner/direct.rs

//! Single-task execution with the worker attached to the parent's terminal.
//! The worker stores its own output; the parent reads it back afterwards.

use tracing::{info, warn};

use super::{RunOptions, TaskProcessRunner, wait_exit};
use crate::errors::Result;
use crate::model::{ExecutionResult, Task, TaskStatus};
use crate::pool::{SpawnRequest, StdioMode};
use crate::protocol::RunTaskRequest;

impl TaskProcessRunner {
    /// Run `task` with inherited stdio.
    ///
    /// Once the worker has been forked this never fails: an unreadable
    /// output file is logged and yields empty output.
    pub async fn run_direct(&self, task: &Task, options: RunOptions<'_>) -> Result<ExecutionResult> {
        if options.stream_output {
            self.announce_task(task);
        }

        let worker = self.pool.spawn(SpawnRequest {
            command: &self.config.task_worker,
            stdio: StdioMode::Inherit,
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

        let exit = wait_exit(worker.exit).await;
        let code = exit.derived_code();
        info!(task = %task.id, pid, exit_code = code, "task finished");

        let terminal_output = match self.store.read(options.output_path) {
            Ok(output) => {
                if !options.stream_output {
                    self.reporter
                        .print_task_terminal_output(task, TaskStatus::from_code(code), &output);
                }
                output
            }
            Err(err) => {
                warn!(
                    task = %task.id,
                    exit_code = code,
                    signal = exit.signal_name().unwrap_or("none"),
                    error = %format!("{err:#}"),
                    "unable to print terminal output for task"
                );
                String::new()
            }
        };

        Ok(ExecutionResult {
            code,
            terminal_output,
        })
    }
}
