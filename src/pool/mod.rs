// src/pool/mod.rs

//! Process pool: forks worker processes and tracks them until they are reaped.
//!
//! Every child is registered in the pool's live set before [`ProcessPool::spawn`]
//! returns, and removed by a per-child wait task once its exit status has been
//! collected. Signal handling ([`signals`]) and upstream relaying act on a
//! snapshot of that set.
//!
//! Each worker gets a [`ControlChannel`] on fd 3 in addition to its stdio.

pub mod exit;
pub mod signals;

use std::collections::HashMap;
use std::fmt;
use std::io;
use std::os::fd::{AsRawFd, RawFd};
use std::process::Stdio;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::net::UnixStream;
use tokio::process::{ChildStderr, ChildStdout, Command};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::errors::{Result, TaskforkError};
use crate::model::Environment;
use crate::protocol::{CHILD_CONTROL_FD, CONTROL_FD_ENV, ControlChannel, ControlSender};

pub use exit::{ProcessExit, signal_to_code};

/// Program and arguments used to start a worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerCommand {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl WorkerCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// `sh -c <script>`.
    pub fn shell(script: impl Into<String>) -> Self {
        Self::new("sh").arg("-c").arg(script)
    }
}

impl fmt::Display for WorkerCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StdioMode {
    /// stdin, stdout and stderr are shared with the parent.
    Inherit,
    /// stdin is shared; stdout and stderr are piped back to the parent.
    Pipe,
}

#[derive(Debug, Clone, Copy)]
pub struct SpawnRequest<'a> {
    pub command: &'a WorkerCommand,
    pub stdio: StdioMode,
    pub env: &'a Environment,
    /// Task id or executor name, used in logs and errors.
    pub label: &'a str,
}

/// Parent-side handle of a forked worker.
///
/// `exit` resolves exactly once, after the pool has dropped the child from
/// its live set.
#[derive(Debug)]
pub struct WorkerProcess {
    pub pid: u32,
    pub control: ControlSender,
    pub messages: mpsc::UnboundedReceiver<Value>,
    pub exit: oneshot::Receiver<ProcessExit>,
    pub stdout: Option<ChildStdout>,
    pub stderr: Option<ChildStderr>,
}

#[derive(Debug)]
struct LiveChild {
    label: String,
    control: ControlSender,
}

#[derive(Debug, Default)]
struct PoolInner {
    live: Mutex<HashMap<u32, LiveChild>>,
}

impl PoolInner {
    fn live(&self) -> MutexGuard<'_, HashMap<u32, LiveChild>> {
        self.live.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for PoolInner {
    fn drop(&mut self) {
        let live = self.live.get_mut().unwrap_or_else(|poisoned| poisoned.into_inner());
        for (pid, child) in live.drain() {
            debug!(pid, label = %child.label, "pool dropped; terminating worker");
            let _ = kill(Pid::from_raw(pid as i32), Signal::SIGTERM);
        }
    }
}

/// Shared handle to the set of live worker processes.
#[derive(Debug, Clone, Default)]
pub struct ProcessPool {
    inner: Arc<PoolInner>,
}

impl ProcessPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fork a worker. Must be called from within a Tokio runtime.
    ///
    /// On failure nothing is registered.
    pub fn spawn(&self, request: SpawnRequest<'_>) -> Result<WorkerProcess> {
        let label = request.label;
        let spawn_err = |source: io::Error| TaskforkError::Spawn {
            label: label.to_string(),
            source,
        };

        // The child end stays blocking; only our end is driven by Tokio.
        let (parent_end, child_end) = std::os::unix::net::UnixStream::pair().map_err(spawn_err)?;
        parent_end.set_nonblocking(true).map_err(spawn_err)?;
        let parent_end = UnixStream::from_std(parent_end).map_err(spawn_err)?;

        let mut cmd = Command::new(&request.command.program);
        cmd.args(&request.command.args)
            .envs(request.env)
            .env(CONTROL_FD_ENV, CHILD_CONTROL_FD.to_string())
            .stdin(Stdio::inherit())
            .kill_on_drop(true);

        match request.stdio {
            StdioMode::Inherit => {
                cmd.stdout(Stdio::inherit()).stderr(Stdio::inherit());
            }
            StdioMode::Pipe => {
                cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
            }
        }

        install_control_fd(&mut cmd, child_end.as_raw_fd());

        let mut child = cmd.spawn().map_err(spawn_err)?;
        drop(child_end);

        let pid = child.id().ok_or_else(|| {
            spawn_err(io::Error::other("worker exited before it could be registered"))
        })?;

        let channel = ControlChannel::open(parent_end, label);
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        self.inner.live().insert(
            pid,
            LiveChild {
                label: label.to_string(),
                control: channel.sender.clone(),
            },
        );
        info!(pid, label, command = %request.command, "worker process started");

        let (exit_tx, exit_rx) = oneshot::channel();
        let pool = Arc::downgrade(&self.inner);
        let label = label.to_string();
        tokio::spawn(async move {
            let exit = match child.wait().await {
                Ok(status) => ProcessExit::from(status),
                Err(err) => {
                    warn!(pid, label = %label, error = %err, "failed to collect worker exit status");
                    ProcessExit::default()
                }
            };
            reap(&pool, pid);
            debug!(
                pid,
                label = %label,
                exit_code = exit.derived_code(),
                signal = exit.signal_name().unwrap_or("none"),
                "worker process reaped"
            );
            let _ = exit_tx.send(exit);
        });

        Ok(WorkerProcess {
            pid,
            control: channel.sender,
            messages: channel.messages,
            exit: exit_rx,
            stdout,
            stderr,
        })
    }

    /// Send `message` verbatim to every live, still-connected worker.
    /// Returns how many workers it was queued for.
    pub fn broadcast(&self, message: &Value) -> usize {
        let targets: Vec<(u32, ControlSender)> = self
            .inner
            .live()
            .iter()
            .map(|(pid, child)| (*pid, child.control.clone()))
            .collect();

        let mut delivered = 0;
        for (pid, control) in targets {
            if !control.is_connected() {
                continue;
            }
            match control.send_value(message.clone()) {
                Ok(()) => delivered += 1,
                Err(err) => trace!(pid, error = %err, "skipping disconnected worker"),
            }
        }
        delivered
    }

    /// Send `signal` to every live worker. Returns how many were signalled.
    pub fn terminate_all(&self, signal: Signal) -> usize {
        let pids = self.live_pids();
        let mut signalled = 0;
        for pid in pids {
            match kill(Pid::from_raw(pid as i32), signal) {
                Ok(()) => signalled += 1,
                Err(err) => debug!(pid, error = %err, signal = signal.as_str(), "failed to signal worker"),
            }
        }
        signalled
    }

    pub fn live_count(&self) -> usize {
        self.inner.live().len()
    }

    pub fn live_pids(&self) -> Vec<u32> {
        let mut pids: Vec<u32> = self.inner.live().keys().copied().collect();
        pids.sort_unstable();
        pids
    }

    /// Broadcast every message arriving on `upstream` to the live workers.
    ///
    /// The relay stops when `upstream` closes or the pool is dropped.
    pub fn relay_from(&self, mut upstream: mpsc::UnboundedReceiver<Value>) -> JoinHandle<()> {
        let pool = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            while let Some(message) = upstream.recv().await {
                let Some(inner) = pool.upgrade() else {
                    break;
                };
                let delivered = ProcessPool { inner }.broadcast(&message);
                debug!(delivered, "relayed upstream control message");
            }
        })
    }
}

fn reap(pool: &Weak<PoolInner>, pid: u32) {
    if let Some(inner) = pool.upgrade() {
        inner.live().remove(&pid);
    }
}

fn install_control_fd(cmd: &mut Command, fd: RawFd) {
    // SAFETY: the hook only issues descriptor syscalls, which are
    // async-signal-safe, between fork and exec.
    unsafe {
        cmd.pre_exec(move || redirect_control_fd(fd));
    }
}

fn redirect_control_fd(fd: RawFd) -> io::Result<()> {
    // SAFETY: `fd` is a descriptor owned by this process; dup2/fcntl do not
    // touch memory.
    unsafe {
        if fd == CHILD_CONTROL_FD {
            let flags = libc::fcntl(fd, libc::F_GETFD);
            if flags == -1 || libc::fcntl(fd, libc::F_SETFD, flags & !libc::FD_CLOEXEC) == -1 {
                return Err(io::Error::last_os_error());
            }
        } else if libc::dup2(fd, CHILD_CONTROL_FD) == -1 {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}
