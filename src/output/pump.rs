// src/output/pump.rs

//! Reading a worker's piped stdout/stderr.
//!
//! Each stream gets its own pump task. Every chunk is appended to a shared
//! [`OutputBuffer`] in arrival order, so the buffer interleaves both streams
//! the way the worker produced them. A pump may also tee the chunk through an
//! [`OutputPipeline`] to a terminal sink.

use std::sync::{Arc, Mutex};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::task::JoinHandle;
use tracing::warn;

use super::transform::OutputPipeline;
use crate::errors::Result;

pub type TerminalSink = Arc<tokio::sync::Mutex<Box<dyn AsyncWrite + Send + Unpin>>>;

pub fn sink<W>(writer: W) -> TerminalSink
where
    W: AsyncWrite + Send + Unpin + 'static,
{
    Arc::new(tokio::sync::Mutex::new(Box::new(writer)))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Stdout,
    Stderr,
}

impl StreamKind {
    pub fn as_str(self) -> &'static str {
        match self {
            StreamKind::Stdout => "stdout",
            StreamKind::Stderr => "stderr",
        }
    }
}

/// Where streamed output is written: the parent's own stdout and stderr by
/// default.
#[derive(Clone)]
pub struct TerminalSinks {
    pub stdout: TerminalSink,
    pub stderr: TerminalSink,
}

impl TerminalSinks {
    pub fn process() -> Self {
        Self {
            stdout: sink(tokio::io::stdout()),
            stderr: sink(tokio::io::stderr()),
        }
    }

    pub fn get(&self, stream: StreamKind) -> TerminalSink {
        match stream {
            StreamKind::Stdout => self.stdout.clone(),
            StreamKind::Stderr => self.stderr.clone(),
        }
    }
}

impl std::fmt::Debug for TerminalSinks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TerminalSinks").finish_non_exhaustive()
    }
}

/// Accumulated output of one execution.
#[derive(Debug, Clone, Default)]
pub struct OutputBuffer {
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl OutputBuffer {
    pub fn push(&self, chunk: &[u8]) {
        self.bytes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .extend_from_slice(chunk);
    }

    /// Everything received so far, decoded lossily as UTF-8.
    pub fn contents(&self) -> String {
        let bytes = self.bytes.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

/// Live copy of a stream on its way to the terminal.
pub struct Tee {
    pub pipeline: OutputPipeline,
    pub sink: TerminalSink,
}

impl Tee {
    async fn write(&self, bytes: &[u8]) -> std::io::Result<()> {
        if bytes.is_empty() {
            return Ok(());
        }
        let mut writer = self.sink.lock().await;
        writer.write_all(bytes).await?;
        writer.flush().await
    }
}

/// Pump `rd` to completion. Returns the number of bytes read.
///
/// A failing terminal write stops the tee but not the capture.
pub fn pump_stream<R>(
    mut rd: R,
    buffer: OutputBuffer,
    mut tee: Option<Tee>,
    stream: StreamKind,
) -> JoinHandle<Result<u64>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = vec![0u8; 16 * 1024];
        let mut total = 0u64;

        loop {
            let n = rd.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            buffer.push(&buf[..n]);
            total += n as u64;

            let mut tee_failed = false;
            if let Some(tee) = tee.as_mut() {
                let transformed = tee.pipeline.push(&buf[..n]);
                if let Err(err) = tee.write(&transformed).await {
                    warn!(stream = stream.as_str(), error = %err, "terminal write failed; streaming stopped");
                    tee_failed = true;
                }
            }
            if tee_failed {
                tee = None;
            }
        }

        if let Some(mut tee) = tee {
            let rest = tee.pipeline.finish();
            if let Err(err) = tee.write(&rest).await {
                warn!(stream = stream.as_str(), error = %err, "terminal write failed");
            }
        }

        Ok(total)
    })
}
