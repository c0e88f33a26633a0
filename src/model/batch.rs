// src/model/batch.rs

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::task::{TaskGraph, TaskId};

/// A group of tasks that share one executor and run inside a single worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Batch {
    pub executor_name: String,
    pub task_graph: TaskGraph,
}

impl Batch {
    pub fn new(executor_name: impl Into<String>, task_graph: TaskGraph) -> Self {
        Self {
            executor_name: executor_name.into(),
            task_graph,
        }
    }

    /// Build a batch from a slice of the full graph.
    pub fn from_graph<'a>(
        executor_name: impl Into<String>,
        full_graph: &TaskGraph,
        ids: impl IntoIterator<Item = &'a str>,
    ) -> Self {
        Self::new(executor_name, full_graph.restrict(ids))
    }

    pub fn len(&self) -> usize {
        self.task_graph.len()
    }

    pub fn is_empty(&self) -> bool {
        self.task_graph.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskResult {
    pub success: bool,
    #[serde(default)]
    pub terminal_output: String,
}

impl TaskResult {
    pub fn succeeded(terminal_output: impl Into<String>) -> Self {
        Self {
            success: true,
            terminal_output: terminal_output.into(),
        }
    }

    /// Result recorded for a task whose worker died without reporting.
    pub fn failed_without_output() -> Self {
        Self {
            success: false,
            terminal_output: String::new(),
        }
    }
}

pub type BatchResults = BTreeMap<TaskId, TaskResult>;

/// Outcome of a single-task execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    pub code: i32,
    pub terminal_output: String,
}

impl ExecutionResult {
    pub fn status(&self) -> TaskStatus {
        TaskStatus::from_code(self.code)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Success,
    Failure,
}

impl TaskStatus {
    pub fn from_code(code: i32) -> Self {
        if code == 0 {
            TaskStatus::Success
        } else {
            TaskStatus::Failure
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Success => "success",
            TaskStatus::Failure => "failure",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
