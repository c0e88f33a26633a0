// src/protocol/task.rs

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::{Task, TaskGraph, TaskTarget};

/// The one message a single-task worker receives after it starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunTaskRequest {
    pub target_description: TaskTarget,
    pub overrides: BTreeMap<String, Value>,
    pub task_graph: TaskGraph,
    pub is_verbose: bool,
}

impl RunTaskRequest {
    pub fn for_task(task: &Task, task_graph: &TaskGraph, is_verbose: bool) -> Self {
        Self {
            target_description: task.target.clone(),
            overrides: task.overrides.clone(),
            task_graph: task_graph.clone(),
            is_verbose,
        }
    }
}
