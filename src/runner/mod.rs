// src/runner/mod.rs

//! Task process runner.
//!
//! Chooses how a task or batch is executed and turns the worker's exit and
//! messages into a result:
//!
//! - [`batch`]: many tasks of one executor in a single worker.
//! - [`captured`]: one task, output piped back and stored by the parent.
//! - [`direct`]: one task, output inherited and stored by the worker.
//!
//! Messages a worker sends that the runner does not consume are re-emitted
//! unchanged on the upstream channel, if one is attached.

pub mod batch;
pub mod captured;
pub mod direct;
pub mod reporter;

use std::path::Path;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::config::RunnerConfig;
use crate::model::{Environment, Task, TaskGraph};
use crate::output::{FsOutputStore, TerminalOutputStore, TerminalSinks};
use crate::pool::{ProcessExit, ProcessPool};
use crate::protocol::{ControlChannel, ControlSender};

pub use reporter::{ConsoleReporter, Reporter, display_command, printable_command_args};

/// Per-execution inputs for the single-task paths.
#[derive(Debug, Clone, Copy)]
pub struct RunOptions<'a> {
    /// Show output live instead of printing it once the task is done.
    pub stream_output: bool,
    /// Where the terminal output of this execution is stored.
    pub output_path: &'a Path,
    pub task_graph: &'a TaskGraph,
    pub env: &'a Environment,
}

pub struct TaskProcessRunner {
    pool: ProcessPool,
    config: RunnerConfig,
    reporter: Arc<dyn Reporter>,
    store: Arc<dyn TerminalOutputStore>,
    terminal: TerminalSinks,
    upstream: Option<ControlSender>,
}

impl TaskProcessRunner {
    pub fn new(pool: ProcessPool, config: RunnerConfig) -> Self {
        Self {
            pool,
            config,
            reporter: Arc::new(ConsoleReporter),
            store: Arc::new(FsOutputStore),
            terminal: TerminalSinks::process(),
            upstream: None,
        }
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn Reporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn with_store(mut self, store: Arc<dyn TerminalOutputStore>) -> Self {
        self.store = store;
        self
    }

    pub fn with_terminal(mut self, terminal: TerminalSinks) -> Self {
        self.terminal = terminal;
        self
    }

    /// Where unconsumed worker messages are re-emitted.
    pub fn with_upstream(mut self, upstream: ControlSender) -> Self {
        self.upstream = Some(upstream);
        self
    }

    /// Use our own parent's channel: worker messages go up, and messages
    /// coming down are broadcast to every live worker.
    pub fn attach_upstream(self, channel: ControlChannel) -> Self {
        self.pool.relay_from(channel.messages);
        self.with_upstream(channel.sender)
    }

    pub fn pool(&self) -> &ProcessPool {
        &self.pool
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    fn announce_task(&self, task: &Task) {
        self.reporter.log_command(&display_command(task));
    }

    /// Forward every message from a single-task worker upstream.
    fn forward_worker_messages(&self, messages: mpsc::UnboundedReceiver<Value>, label: &str) {
        tokio::spawn(forward_all(messages, self.upstream.clone(), label.to_string()));
    }
}

async fn forward_all(
    mut messages: mpsc::UnboundedReceiver<Value>,
    upstream: Option<ControlSender>,
    label: String,
) {
    while let Some(message) = messages.recv().await {
        forward_upstream(upstream.as_ref(), &label, message);
    }
}

pub(crate) fn forward_upstream(upstream: Option<&ControlSender>, label: &str, message: Value) {
    match upstream {
        Some(upstream) if upstream.is_connected() => {
            if let Err(err) = upstream.send_value(message) {
                warn!(label, error = %err, "failed to forward worker message upstream");
            }
        }
        _ => debug!(label, "no upstream channel; dropping worker message"),
    }
}

/// The exit of a worker; a lost wait task counts as an unknown exit.
pub(crate) async fn wait_exit(exit: oneshot::Receiver<ProcessExit>) -> ProcessExit {
    exit.await.unwrap_or_default()
}
