// src/protocol/batch.rs

//! Batch worker vocabulary.
//!
//! Typed messages carry a `"type"` discriminator. Anything that does not carry
//! one of the known tags is kept as an opaque [`BatchMessage::Passthrough`]
//! value so it can be relayed further up the process chain untouched.

use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

use crate::model::{BatchResults, TaskGraph};

pub const RUN_TASKS: &str = "runTasks";
pub const COMPLETE_BATCH_EXECUTION: &str = "completeBatchExecution";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunTasks {
    pub executor_name: String,
    pub batch_task_graph: TaskGraph,
    pub full_task_graph: TaskGraph,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompleteBatchExecution {
    pub results: BatchResults,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BatchMessage {
    RunTasks(RunTasks),
    CompleteBatchExecution(CompleteBatchExecution),
    Passthrough(Value),
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
enum Tagged<'a> {
    RunTasks(&'a RunTasks),
    CompleteBatchExecution(&'a CompleteBatchExecution),
}

impl BatchMessage {
    /// Message type tag, if this is a typed message.
    pub fn tag(&self) -> Option<&'static str> {
        match self {
            BatchMessage::RunTasks(_) => Some(RUN_TASKS),
            BatchMessage::CompleteBatchExecution(_) => Some(COMPLETE_BATCH_EXECUTION),
            BatchMessage::Passthrough(_) => None,
        }
    }
}

impl Serialize for BatchMessage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            BatchMessage::RunTasks(m) => Tagged::RunTasks(m).serialize(serializer),
            BatchMessage::CompleteBatchExecution(m) => {
                Tagged::CompleteBatchExecution(m).serialize(serializer)
            }
            BatchMessage::Passthrough(value) => value.serialize(serializer),
        }
    }
}

/// Classify a raw message. A known tag with a malformed body is an error;
/// unknown or missing tags become passthrough.
impl TryFrom<Value> for BatchMessage {
    type Error = serde_json::Error;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value.get("type").and_then(Value::as_str) {
            Some(RUN_TASKS) => Ok(BatchMessage::RunTasks(serde_json::from_value(value)?)),
            Some(COMPLETE_BATCH_EXECUTION) => Ok(BatchMessage::CompleteBatchExecution(
                serde_json::from_value(value)?,
            )),
            _ => Ok(BatchMessage::Passthrough(value)),
        }
    }
}
