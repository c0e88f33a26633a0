// src/protocol/channel.rs

//! Newline-delimited JSON over a Unix socket.
//!
//! Every worker gets one end of a socket pair on file descriptor
//! [`CHILD_CONTROL_FD`], advertised through [`CONTROL_FD_ENV`]. A channel is
//! driven by two background tasks: a writer draining an unbounded queue and a
//! reader decoding one JSON value per line. Malformed lines are logged and
//! skipped.

use std::os::fd::{FromRawFd, RawFd};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::errors::{Result, TaskforkError};

pub const CONTROL_FD_ENV: &str = "TASKFORK_CONTROL_FD";
pub const CHILD_CONTROL_FD: RawFd = 3;

static UPSTREAM_CLAIMED: AtomicBool = AtomicBool::new(false);

/// Cloneable handle for queueing messages on a channel.
#[derive(Debug, Clone)]
pub struct ControlSender {
    tx: mpsc::UnboundedSender<Value>,
    open: Arc<AtomicBool>,
}

impl ControlSender {
    /// A sender that is not backed by a socket. Everything sent shows up on
    /// the returned receiver.
    pub fn detached() -> (Self, mpsc::UnboundedReceiver<Value>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let sender = Self {
            tx,
            open: Arc::new(AtomicBool::new(true)),
        };
        (sender, rx)
    }

    pub fn send<T: Serialize>(&self, message: &T) -> Result<()> {
        let value = serde_json::to_value(message)?;
        self.send_value(value)
    }

    pub fn send_value(&self, message: Value) -> Result<()> {
        if !self.is_connected() {
            return Err(TaskforkError::ControlChannel(
                "control channel is closed".to_string(),
            ));
        }
        self.tx
            .send(message)
            .map_err(|_| TaskforkError::ControlChannel("control channel is closed".to_string()))
    }

    /// False once the peer hung up or the writer failed.
    pub fn is_connected(&self) -> bool {
        self.open.load(Ordering::Acquire) && !self.tx.is_closed()
    }
}

/// Both directions of a control channel.
#[derive(Debug)]
pub struct ControlChannel {
    pub sender: ControlSender,
    pub messages: mpsc::UnboundedReceiver<Value>,
    writer: JoinHandle<()>,
}

impl ControlChannel {
    /// Start the reader and writer tasks for `stream`. Must be called from
    /// within a Tokio runtime.
    pub fn open(stream: UnixStream, label: &str) -> Self {
        let (read_half, write_half) = stream.into_split();
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        let open = Arc::new(AtomicBool::new(true));

        let writer = tokio::spawn(write_loop(write_half, out_rx, open.clone(), label.to_string()));
        tokio::spawn(read_loop(read_half, in_tx, open.clone(), label.to_string()));

        Self {
            sender: ControlSender { tx: out_tx, open },
            messages: in_rx,
            writer,
        }
    }

    /// Stop accepting messages and wait until everything queued so far has
    /// been written. Clones of the sender keep the writer alive.
    pub async fn close(self) {
        let Self {
            sender,
            messages,
            writer,
        } = self;
        drop(sender);
        drop(messages);
        if let Err(err) = writer.await {
            warn!(error = %err, "control channel writer task failed");
        }
    }

    /// Attach to the channel our own parent handed us, if any.
    ///
    /// The descriptor is claimed at most once per process; later calls
    /// return `Ok(None)`.
    pub fn from_env() -> Result<Option<Self>> {
        let raw = match std::env::var(CONTROL_FD_ENV) {
            Ok(raw) => raw,
            Err(_) => return Ok(None),
        };
        let fd: RawFd = raw.trim().parse().map_err(|_| {
            TaskforkError::ControlChannel(format!("invalid {CONTROL_FD_ENV} value '{raw}'"))
        })?;

        if UPSTREAM_CLAIMED.swap(true, Ordering::AcqRel) {
            return Ok(None);
        }

        // SAFETY: the parent placed a connected socket on this descriptor
        // before exec and nothing else in this process takes ownership of it.
        let std_stream = unsafe { std::os::unix::net::UnixStream::from_raw_fd(fd) };
        std_stream.set_nonblocking(true)?;
        let stream = UnixStream::from_std(std_stream)?;
        debug!(fd, "attached to upstream control channel");
        Ok(Some(Self::open(stream, "upstream")))
    }
}

async fn write_loop(
    mut writer: OwnedWriteHalf,
    mut outgoing: mpsc::UnboundedReceiver<Value>,
    open: Arc<AtomicBool>,
    label: String,
) {
    while let Some(message) = outgoing.recv().await {
        let mut line = match serde_json::to_vec(&message) {
            Ok(line) => line,
            Err(err) => {
                warn!(channel = %label, error = %err, "dropping unserialisable control message");
                continue;
            }
        };
        line.push(b'\n');

        if let Err(err) = writer.write_all(&line).await {
            debug!(channel = %label, error = %err, "control channel write failed");
            break;
        }
        trace!(channel = %label, bytes = line.len(), "control message sent");
    }

    open.store(false, Ordering::Release);
    let _ = writer.shutdown().await;
}

async fn read_loop(
    reader: OwnedReadHalf,
    incoming: mpsc::UnboundedSender<Value>,
    open: Arc<AtomicBool>,
    label: String,
) {
    let mut reader = BufReader::new(reader);
    let mut line = Vec::new();
    loop {
        line.clear();
        match reader.read_until(b'\n', &mut line).await {
            Ok(0) => break,
            Ok(_) => {
                if line.trim_ascii().is_empty() {
                    continue;
                }
                match serde_json::from_slice::<Value>(&line) {
                    Ok(value) => {
                        if incoming.send(value).is_err() {
                            trace!(channel = %label, "receiver dropped; discarding message");
                        }
                    }
                    Err(err) => {
                        warn!(channel = %label, error = %err, "skipping malformed control message");
                    }
                }
            }
            Err(err) => {
                debug!(channel = %label, error = %err, "control channel read failed");
                break;
            }
        }
    }

    open.store(false, Ordering::Release);
    debug!(channel = %label, "control channel closed by peer");
}
