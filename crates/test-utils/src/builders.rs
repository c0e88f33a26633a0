#![allow(dead_code)]

use std::time::Duration;

use serde_json::Value;
use taskfork::config::RunnerConfig;
use taskfork::model::{Task, TaskGraph, TaskId, TaskTarget};
use taskfork::pool::WorkerCommand;

/// Builder for `Task`.
pub struct TaskBuilder {
    task: Task,
}

impl TaskBuilder {
    pub fn new(project: &str, target: &str) -> Self {
        Self {
            task: Task::new(TaskTarget::new(project, target)),
        }
    }

    pub fn configuration(mut self, configuration: &str) -> Self {
        let target = self.task.target.clone().with_configuration(configuration);
        self.task.id = target.to_string();
        self.task.target = target;
        self
    }

    pub fn override_value(mut self, key: &str, value: Value) -> Self {
        self.task.overrides.insert(key.to_string(), value);
        self
    }

    pub fn build(self) -> Task {
        self.task
    }
}

/// Builder for `TaskGraph`. Roots are computed on `build()`.
#[derive(Default)]
pub struct TaskGraphBuilder {
    tasks: Vec<Task>,
    deps: Vec<(TaskId, Vec<TaskId>)>,
}

impl TaskGraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn task(mut self, task: Task) -> Self {
        self.tasks.push(task);
        self
    }

    /// Shorthand for a `project:build` task.
    pub fn build_task(self, project: &str) -> Self {
        self.task(TaskBuilder::new(project, "build").build())
    }

    pub fn depends_on(mut self, id: &str, upstream: &[&str]) -> Self {
        self.deps.push((
            id.to_string(),
            upstream.iter().map(|s| s.to_string()).collect(),
        ));
        self
    }

    pub fn build(self) -> TaskGraph {
        TaskGraph::from_parts(self.tasks, self.deps)
    }
}

/// Runner config with both workers set to `worker` and a generous drain
/// window for slow CI machines.
pub fn runner_config(worker: WorkerCommand) -> RunnerConfig {
    RunnerConfig::new(worker.clone(), worker).with_message_drain(Duration::from_millis(500))
}
