#![allow(dead_code)]

//! Worker processes written as `sh -c` scripts.
//!
//! The control channel is file descriptor 3: `read -r line <&3` receives the
//! parent's request, `printf '%s\n' '<json>' >&3` sends a message back.

use serde_json::Value;
use taskfork::pool::WorkerCommand;

pub fn script(body: &str) -> WorkerCommand {
    WorkerCommand::shell(body)
}

/// Ignores its request and exits with `code`.
pub fn exiting_with(code: i32) -> WorkerCommand {
    script(&format!("exit {code}"))
}

/// Reads its request, then kills itself with `signal` (e.g. `TERM`).
pub fn killed_by(signal: &str) -> WorkerCommand {
    script(&format!("read -r _ <&3; kill -{signal} $$; sleep 5"))
}

/// Sends each message in order after reading its request, then exits with
/// `code`.
pub fn replying(messages: &[Value], code: i32) -> WorkerCommand {
    let mut body = String::from("read -r _ <&3");
    for message in messages {
        body.push_str(&format!("; printf '%s\\n' '{}' >&3", message));
    }
    body.push_str(&format!("; exit {code}"));
    script(&body)
}

/// Sends back `{"echo": <request>}` and exits 0.
pub fn echoing_request() -> WorkerCommand {
    script(r#"read -r line <&3; printf '{"echo":%s}\n' "$line" >&3"#)
}

/// Echoes every line it receives on the control channel until it is
/// terminated.
pub fn echoing_forever() -> WorkerCommand {
    script(r#"while read -r line <&3; do printf '%s\n' "$line" >&3; done"#)
}

/// Sleeps without touching the control channel.
pub fn sleeping(seconds: u32) -> WorkerCommand {
    script(&format!("sleep {seconds}"))
}
