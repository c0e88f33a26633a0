// src/pool/signals.rs

//! What the parent does with its workers when it receives a shutdown signal.
//!
//! Interrupt terminates every worker and then exits the parent with 130.
//! Terminate and hangup terminate every worker but leave the parent running,
//! so the caller can still collect whatever the workers report.

use nix::sys::signal::Signal;
use tokio::signal::unix::{SignalKind, signal};
use tokio::task::JoinHandle;
use tracing::info;

use super::ProcessPool;
use crate::errors::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    Interrupt,
    Terminate,
    Hangup,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalAction {
    /// Workers were signalled; the parent should exit with this code.
    Exit(i32),
    /// Workers were signalled; the parent keeps running.
    Continue,
}

impl ShutdownSignal {
    pub fn as_str(self) -> &'static str {
        match self {
            ShutdownSignal::Interrupt => "SIGINT",
            ShutdownSignal::Terminate => "SIGTERM",
            ShutdownSignal::Hangup => "SIGHUP",
        }
    }

    pub fn action(self) -> SignalAction {
        match self {
            ShutdownSignal::Interrupt => SignalAction::Exit(128 + 2),
            ShutdownSignal::Terminate | ShutdownSignal::Hangup => SignalAction::Continue,
        }
    }
}

/// Send SIGTERM to every live worker and report what the parent should do next.
pub fn handle_shutdown_signal(pool: &ProcessPool, received: ShutdownSignal) -> SignalAction {
    let signalled = pool.terminate_all(Signal::SIGTERM);
    info!(
        signal = received.as_str(),
        workers = signalled,
        "shutdown signal received; terminating workers"
    );
    received.action()
}

/// Listen for SIGINT, SIGTERM and SIGHUP for the lifetime of the process and
/// apply [`handle_shutdown_signal`] to `pool`.
pub fn install_signal_handlers(pool: ProcessPool) -> Result<JoinHandle<()>> {
    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;
    let mut hangup = signal(SignalKind::hangup())?;

    Ok(tokio::spawn(async move {
        loop {
            let received = tokio::select! {
                Some(()) = interrupt.recv() => ShutdownSignal::Interrupt,
                Some(()) = terminate.recv() => ShutdownSignal::Terminate,
                Some(()) = hangup.recv() => ShutdownSignal::Hangup,
                else => break,
            };

            if let SignalAction::Exit(code) = handle_shutdown_signal(&pool, received) {
                std::process::exit(code);
            }
        }
    }))
}
