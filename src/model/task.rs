// src/model/task.rs

//! Tasks and the dependency graph they live in.
//!
//! The graph is built upstream and is read-only here. It is serialised as-is
//! into the messages sent to worker processes, so field names follow the
//! camelCase wire format.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub type TaskId = String;

/// What a task builds: a target of a project, optionally with a named
/// configuration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskTarget {
    pub project: String,
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub configuration: Option<String>,
}

impl TaskTarget {
    pub fn new(project: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            target: target.into(),
            configuration: None,
        }
    }

    pub fn with_configuration(mut self, configuration: impl Into<String>) -> Self {
        self.configuration = Some(configuration.into());
        self
    }
}

impl fmt::Display for TaskTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.project, self.target)?;
        if let Some(configuration) = &self.configuration {
            write!(f, ":{configuration}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,
    pub target: TaskTarget,
    #[serde(default)]
    pub overrides: BTreeMap<String, Value>,
}

impl Task {
    /// Create a task whose id is the rendered target (`project:target[:config]`).
    pub fn new(target: TaskTarget) -> Self {
        Self {
            id: target.to_string(),
            target,
            overrides: BTreeMap::new(),
        }
    }

    pub fn with_override(mut self, key: impl Into<String>, value: Value) -> Self {
        self.overrides.insert(key.into(), value);
        self
    }

    pub fn project(&self) -> &str {
        &self.target.project
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskGraph {
    #[serde(default)]
    pub roots: Vec<TaskId>,
    #[serde(default)]
    pub tasks: BTreeMap<TaskId, Task>,
    #[serde(default)]
    pub dependencies: BTreeMap<TaskId, Vec<TaskId>>,
}

impl TaskGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from tasks and dependency edges, computing roots as the
    /// tasks with no dependencies inside the graph.
    pub fn from_parts(
        tasks: impl IntoIterator<Item = Task>,
        dependencies: impl IntoIterator<Item = (TaskId, Vec<TaskId>)>,
    ) -> Self {
        let tasks: BTreeMap<TaskId, Task> =
            tasks.into_iter().map(|t| (t.id.clone(), t)).collect();

        let mut deps: BTreeMap<TaskId, Vec<TaskId>> =
            tasks.keys().map(|id| (id.clone(), Vec::new())).collect();
        for (id, upstream) in dependencies {
            if let Some(entry) = deps.get_mut(&id) {
                entry.extend(upstream.into_iter().filter(|d| tasks.contains_key(d)));
            }
        }

        let roots = compute_roots(&deps);
        Self {
            roots,
            tasks,
            dependencies: deps,
        }
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn task(&self, id: &str) -> Option<&Task> {
        self.tasks.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.tasks.contains_key(id)
    }

    pub fn dependencies_of(&self, id: &str) -> &[TaskId] {
        self.dependencies.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Projection of this graph onto `ids`.
    ///
    /// Only member tasks and the edges between members are kept. Roots are
    /// recomputed, so a member whose dependencies all live outside the slice
    /// becomes a root. Unknown ids are skipped.
    pub fn restrict<'a>(&self, ids: impl IntoIterator<Item = &'a str>) -> TaskGraph {
        let members: BTreeSet<&str> = ids.into_iter().filter(|id| self.contains(id)).collect();

        let tasks: BTreeMap<TaskId, Task> = members
            .iter()
            .filter_map(|id| self.tasks.get(*id).map(|t| (t.id.clone(), t.clone())))
            .collect();

        let dependencies: BTreeMap<TaskId, Vec<TaskId>> = members
            .iter()
            .map(|id| {
                let inside = self
                    .dependencies_of(id)
                    .iter()
                    .filter(|d| members.contains(d.as_str()))
                    .cloned()
                    .collect();
                ((*id).to_string(), inside)
            })
            .collect();

        let roots = compute_roots(&dependencies);
        TaskGraph {
            roots,
            tasks,
            dependencies,
        }
    }
}

fn compute_roots(dependencies: &BTreeMap<TaskId, Vec<TaskId>>) -> Vec<TaskId> {
    dependencies
        .iter()
        .filter(|(_, upstream)| upstream.is_empty())
        .map(|(id, _)| id.clone())
        .collect()
}
