#![allow(dead_code)]

//! In-memory stand-ins for the runner's collaborators.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use anyhow::{Result, anyhow};
use taskfork::model::{Task, TaskStatus};
use taskfork::output::pump::sink;
use taskfork::output::{TerminalOutputStore, TerminalSinks};
use taskfork::runner::Reporter;
use tokio::io::AsyncWrite;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReporterEvent {
    SingleLine(String),
    Command(String),
    TaskOutput {
        task: String,
        status: TaskStatus,
        output: String,
    },
}

/// Reporter that records every call.
#[derive(Debug, Clone, Default)]
pub struct RecordingReporter {
    events: Arc<Mutex<Vec<ReporterEvent>>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ReporterEvent> {
        self.events.lock().unwrap().clone()
    }

    fn record(&self, event: ReporterEvent) {
        self.events.lock().unwrap().push(event);
    }
}

impl Reporter for RecordingReporter {
    fn log_single_line(&self, text: &str) {
        self.record(ReporterEvent::SingleLine(text.to_string()));
    }

    fn log_command(&self, command: &str) {
        self.record(ReporterEvent::Command(command.to_string()));
    }

    fn print_task_terminal_output(&self, task: &Task, status: TaskStatus, output: &str) {
        self.record(ReporterEvent::TaskOutput {
            task: task.id.clone(),
            status,
            output: output.to_string(),
        });
    }
}

/// Terminal output store backed by a map.
#[derive(Debug, Clone, Default)]
pub struct MemoryOutputStore {
    files: Arc<Mutex<HashMap<PathBuf, String>>>,
    fail_writes: bool,
}

impl MemoryOutputStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose writes always fail.
    pub fn failing_writes() -> Self {
        Self {
            fail_writes: true,
            ..Self::default()
        }
    }

    pub fn insert(&self, path: impl AsRef<Path>, content: &str) {
        self.files
            .lock()
            .unwrap()
            .insert(path.as_ref().to_path_buf(), content.to_string());
    }

    pub fn get(&self, path: impl AsRef<Path>) -> Option<String> {
        self.files.lock().unwrap().get(path.as_ref()).cloned()
    }
}

impl TerminalOutputStore for MemoryOutputStore {
    fn read(&self, path: &Path) -> Result<String> {
        self.get(path)
            .ok_or_else(|| anyhow!("no terminal output stored at {:?}", path))
    }

    fn write(&self, path: &Path, content: &str) -> Result<()> {
        if self.fail_writes {
            return Err(anyhow!("store is read-only: {:?}", path));
        }
        self.insert(path, content);
        Ok(())
    }
}

/// `AsyncWrite` that appends into a shared buffer.
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer {
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.bytes.lock().unwrap()).into_owned()
    }
}

impl AsyncWrite for SharedBuffer {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.bytes.lock().unwrap().extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

/// Terminal sinks that record stdout and stderr separately.
pub fn recording_terminal() -> (TerminalSinks, SharedBuffer, SharedBuffer) {
    let stdout = SharedBuffer::new();
    let stderr = SharedBuffer::new();
    let sinks = TerminalSinks {
        stdout: sink(stdout.clone()),
        stderr: sink(stderr.clone()),
    };
    (sinks, stdout, stderr)
}
