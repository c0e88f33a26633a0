// src/pool/exit.rs

//! Raw process exit information and the logical exit code derived from it.

use std::os::unix::process::ExitStatusExt;
use std::process::ExitStatus;

use nix::sys::signal::Signal;

/// How a child terminated: a normal exit code, a terminating signal, or
/// neither when the status could not be collected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessExit {
    pub code: Option<i32>,
    pub signal: Option<i32>,
}

impl ProcessExit {
    pub fn exited(code: i32) -> Self {
        Self {
            code: Some(code),
            signal: None,
        }
    }

    pub fn signaled(signal: i32) -> Self {
        Self {
            code: None,
            signal: Some(signal),
        }
    }

    /// The literal exit code for a normal exit, otherwise the shell
    /// convention for the terminating signal.
    pub fn derived_code(&self) -> i32 {
        match self.code {
            Some(code) => code,
            None => signal_to_code(self.signal),
        }
    }

    pub fn success(&self) -> bool {
        self.derived_code() == 0
    }

    /// Name of the terminating signal, e.g. `"SIGTERM"`.
    pub fn signal_name(&self) -> Option<&'static str> {
        self.signal
            .and_then(|s| Signal::try_from(s).ok())
            .map(Signal::as_str)
    }
}

impl From<ExitStatus> for ProcessExit {
    fn from(status: ExitStatus) -> Self {
        Self {
            code: status.code(),
            signal: status.signal(),
        }
    }
}

/// 128 plus the signal number for hangup, interrupt and terminate; 128 for
/// anything else.
pub fn signal_to_code(signal: Option<i32>) -> i32 {
    match signal.and_then(|s| Signal::try_from(s).ok()) {
        Some(Signal::SIGHUP) => 128 + 1,
        Some(Signal::SIGINT) => 128 + 2,
        Some(Signal::SIGTERM) => 128 + 15,
        _ => 128,
    }
}
