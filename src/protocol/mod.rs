// src/protocol/mod.rs

//! Messages exchanged with worker processes and the channel that carries them.
//!
//! - [`channel`] frames JSON values as lines over a Unix socket.
//! - [`batch`] is the tagged vocabulary spoken by batch workers.
//! - [`task`] is the request sent to a single-task worker.

pub mod batch;
pub mod channel;
pub mod task;

pub use batch::{BatchMessage, CompleteBatchExecution, RunTasks};
pub use channel::{CHILD_CONTROL_FD, CONTROL_FD_ENV, ControlChannel, ControlSender};
pub use task::RunTaskRequest;
