// src/model/mod.rs

//! Data types shared between the runner, the pool and worker processes.
//!
//! - [`task`] holds tasks, their targets and the task graph.
//! - [`batch`] holds batches and the result types produced by executions.

pub mod batch;
pub mod task;

use std::collections::HashMap;

pub use batch::{Batch, BatchResults, ExecutionResult, TaskResult, TaskStatus};
pub use task::{Task, TaskGraph, TaskId, TaskTarget};

/// Extra environment variables layered on top of the parent's environment
/// when a worker is forked.
pub type Environment = HashMap<String, String>;
